//! Source descriptors, table schemas and field descriptors.
//!
//! A source descriptor follows the datapackage layout:
//!
//! ```yaml
//! resources:
//!   - name: projects
//!     schema:
//!       fields:
//!         - name: total_amount
//!           type: number
//!           decimalChar: ","
//!           groupChar: "."
//!         - name: approval_date
//!           type: date
//!           format: DD/MM/YYYY
//! ```
//!
//! Keys the sniffer does not interpret (titles, descriptions, custom metadata)
//! are kept verbatim so a descriptor can be written back unchanged apart from
//! the format hints recorded after sniffing. JSON descriptors load through the
//! same path since YAML is a superset.

use std::{collections::BTreeMap, fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_yaml::Value as YamlValue;

use crate::{
    data::{CastOptions, CurrencyStrip},
    error::{Error, Result},
    formats::{Candidate, NumberFormat, resolve_date_hint, resolve_number_hints},
};

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Date,
    Number,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Date => "date",
            FieldType::Number => "number",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "date" => Ok(FieldType::Date),
            "number" => Ok(FieldType::Number),
            _ => Err(Error::UnsupportedFieldType(value.to_string())),
        }
    }
}

impl Serialize for FieldType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        FieldType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Date pattern hint, or `currency` on number fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_char: Option<String>,
    /// Empty string means the column uses no grouping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_char: Option<String>,
    /// Currency symbol to strip from this field, on top of the configured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, YamlValue>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            format: None,
            decimal_char: None,
            group_char: None,
            currency: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_separators(mut self, decimal: &str, group: &str) -> Self {
        self.decimal_char = Some(decimal.to_string());
        self.group_char = Some(group.to_string());
        self
    }

    pub fn is_currency(&self) -> bool {
        self.field_type == FieldType::Number
            && self
                .format
                .as_deref()
                .is_some_and(|format| format.eq_ignore_ascii_case("currency"))
    }

    /// Candidates allowed by this field's hints, or `None` to use the full catalog.
    pub fn hinted_candidates(&self) -> Result<Option<Vec<Candidate>>> {
        match self.field_type {
            FieldType::String => Ok(None),
            FieldType::Date => self
                .format
                .as_deref()
                .map(|hint| resolve_date_hint(&self.name, hint).map(|f| vec![Candidate::Date(f)]))
                .transpose(),
            FieldType::Number => {
                if self.decimal_char.is_none() && self.group_char.is_none() {
                    return Ok(None);
                }
                let formats = resolve_number_hints(
                    &self.name,
                    self.decimal_char.as_deref(),
                    self.group_char.as_deref(),
                )?;
                Ok(Some(formats.into_iter().map(Candidate::Number).collect()))
            }
        }
    }

    /// Options every candidate for this field casts with.
    pub fn cast_options(&self, configured_currency: Option<&str>, max_fraction_digits: u32) -> CastOptions {
        let symbol = self.currency.as_deref().or(configured_currency);
        let mut currency = symbol.map(CurrencyStrip::symbol).unwrap_or_default();
        if self.is_currency() {
            currency = currency.with_common_symbols();
        }
        CastOptions {
            currency,
            max_fraction_digits,
        }
    }

    /// Records a sniffed format as hints so later runs skip the search.
    pub fn record_format(&mut self, candidate: &Candidate) {
        match candidate {
            Candidate::Date(format) => {
                self.format = Some(format.pattern().to_string());
            }
            Candidate::Number(format) => self.record_number_format(format),
        }
    }

    fn record_number_format(&mut self, format: &NumberFormat) {
        self.decimal_char = Some(format.decimal_char().to_string());
        self.group_char = Some(format.group_hint());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, YamlValue>,
}

impl TableSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            extra: BTreeMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub schema: TableSchema,
    #[serde(flatten)]
    pub extra: BTreeMap<String, YamlValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, YamlValue>,
}

impl SourceDescriptor {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let descriptor: SourceDescriptor = serde_yaml::from_reader(BufReader::new(file))?;
        Ok(descriptor)
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// The named resource, or the first one when no name is given.
    pub fn resource(&self, name: Option<&str>) -> Result<&Resource> {
        let index = self.resource_index(name)?;
        Ok(&self.resources[index])
    }

    pub fn resource_mut(&mut self, name: Option<&str>) -> Result<&mut Resource> {
        let index = self.resource_index(name)?;
        Ok(&mut self.resources[index])
    }

    fn resource_index(&self, name: Option<&str>) -> Result<usize> {
        match name {
            Some(name) => self
                .resources
                .iter()
                .position(|r| r.name.as_deref() == Some(name))
                .ok_or_else(|| Error::ResourceNotFound(format!("'{name}'"))),
            None if self.resources.is_empty() => {
                Err(Error::ResourceNotFound("(none declared)".to_string()))
            }
            None => Ok(0),
        }
    }

    /// Overwrites declared field types from an external `field -> type` lookup.
    ///
    /// Fields missing from the lookup keep their declared type. Returns the
    /// number of fields whose type changed.
    pub fn update_field_types(
        &mut self,
        resource: Option<&str>,
        lookup: &BTreeMap<String, FieldType>,
    ) -> Result<usize> {
        let resource = self.resource_mut(resource)?;
        let mut changed = 0usize;
        for field in &mut resource.schema.fields {
            if let Some(&field_type) = lookup.get(&field.name)
                && field.field_type != field_type
            {
                debug!(
                    "Field '{}' type {} -> {}",
                    field.name, field.field_type, field_type
                );
                field.field_type = field_type;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Loads a `field: type` mapping such as a target fiscal schema's type table.
pub fn load_type_lookup(path: &Path) -> Result<BTreeMap<String, FieldType>> {
    let file = File::open(path)?;
    Ok(serde_yaml::from_reader(BufReader::new(file))?)
}
