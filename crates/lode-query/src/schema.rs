use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError(pub String);

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema error: {}", self.0)
    }
}

impl std::error::Error for SchemaError {}

// ── Types ─────────────────────────────────────────────────────

/// Declared value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    Date,
    Bytes,
    Geometry,
    List(Box<AttributeType>),
    Map(Box<AttributeType>, Box<AttributeType>),
}

impl AttributeType {
    /// Parse a type name as written in a schema spec string, e.g. `Int`,
    /// `Date`, `List[String]` or `Map[String,Int]`.
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        let s = s.trim();
        if let Some(inner) = strip_generic(s, "List") {
            let elem = AttributeType::parse(inner)?;
            if elem.is_collection() {
                return Err(SchemaError(format!("nested collection type: {s}")));
            }
            return Ok(AttributeType::List(Box::new(elem)));
        }
        if let Some(inner) = strip_generic(s, "Map") {
            let (k, v) = inner
                .split_once(',')
                .ok_or_else(|| SchemaError(format!("map type needs key and value: {s}")))?;
            return Ok(AttributeType::Map(
                Box::new(AttributeType::parse(k)?),
                Box::new(AttributeType::parse(v)?),
            ));
        }
        let ty = match s {
            "String" => AttributeType::String,
            "Int" | "Integer" => AttributeType::Int32,
            "Long" => AttributeType::Int64,
            "Float" => AttributeType::Float32,
            "Double" => AttributeType::Float64,
            "Boolean" => AttributeType::Boolean,
            "Date" => AttributeType::Date,
            "Bytes" => AttributeType::Bytes,
            "Geometry" | "Point" | "LineString" | "Polygon" | "MultiPoint" | "MultiLineString"
            | "MultiPolygon" => AttributeType::Geometry,
            other => return Err(SchemaError(format!("unknown attribute type: {other}"))),
        };
        Ok(ty)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, AttributeType::List(_) | AttributeType::Map(..))
    }
}

fn strip_generic<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?.strip_prefix('[')?.strip_suffix(']')
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    High,
    Low,
    #[default]
    Unknown,
}

// ── AttributeDescriptor ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub ty: AttributeType,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub cardinality: Cardinality,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
            indexed: false,
            cardinality: Cardinality::Unknown,
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self.ty, AttributeType::List(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.ty, AttributeType::Map(..))
    }

    /// The type each index row of this attribute encodes: the element
    /// type for lists, the declared type otherwise.
    pub fn index_type(&self) -> &AttributeType {
        match &self.ty {
            AttributeType::List(elem) => elem,
            ty => ty,
        }
    }
}

// ── FeatureSchema ─────────────────────────────────────────────

/// Ordered attribute descriptors of one feature type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub type_name: String,
    attributes: Vec<AttributeDescriptor>,
    default_geometry: Option<String>,
    default_date: Option<String>,
}

impl FeatureSchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
            default_geometry: None,
            default_date: None,
        }
    }

    /// Append an attribute. The first geometry and the first date become
    /// the defaults unless set explicitly.
    pub fn attribute(mut self, descriptor: AttributeDescriptor) -> Self {
        if descriptor.ty == AttributeType::Geometry && self.default_geometry.is_none() {
            self.default_geometry = Some(descriptor.name.clone());
        }
        if descriptor.ty == AttributeType::Date && self.default_date.is_none() {
            self.default_date = Some(descriptor.name.clone());
        }
        self.attributes.push(descriptor);
        self
    }

    pub fn with_default_geometry(mut self, name: impl Into<String>) -> Self {
        self.default_geometry = Some(name.into());
        self
    }

    pub fn with_default_date(mut self, name: impl Into<String>) -> Self {
        self.default_date = Some(name.into());
        self
    }

    /// Parse a compact spec string:
    ///
    /// ```text
    /// name:String:index=true,age:Int:index=true:cardinality=high,tags:List[String]:index=true,dtg:Date,*geom:Point
    /// ```
    ///
    /// A leading `*` marks the default geometry.
    pub fn parse(type_name: &str, spec: &str) -> Result<Self, SchemaError> {
        let mut schema = FeatureSchema::new(type_name);
        let mut explicit_geom = None;

        for part in split_top_level(spec) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, rest) = part
                .split_once(':')
                .ok_or_else(|| SchemaError(format!("attribute without type: {part}")))?;
            let (name, is_default) = match name.strip_prefix('*') {
                Some(n) => (n, true),
                None => (name, false),
            };
            if name.is_empty() {
                return Err(SchemaError(format!("attribute without name: {part}")));
            }
            if schema.descriptor(name).is_some() {
                return Err(SchemaError(format!("duplicate attribute: {name}")));
            }

            let mut options = rest.split(':');
            let ty = AttributeType::parse(options.next().unwrap_or_default())?;
            let mut descriptor = AttributeDescriptor::new(name, ty);
            for opt in options {
                let (key, value) = opt
                    .split_once('=')
                    .ok_or_else(|| SchemaError(format!("malformed option '{opt}' on {name}")))?;
                match key {
                    "index" => descriptor.indexed = !matches!(value, "false" | "none"),
                    "cardinality" => {
                        descriptor.cardinality = match value {
                            "high" => Cardinality::High,
                            "low" => Cardinality::Low,
                            _ => Cardinality::Unknown,
                        }
                    }
                    other => {
                        return Err(SchemaError(format!("unknown option '{other}' on {name}")));
                    }
                }
            }
            if descriptor.indexed && descriptor.is_map() {
                return Err(SchemaError(format!("map attribute cannot be indexed: {name}")));
            }
            if is_default {
                if descriptor.ty != AttributeType::Geometry {
                    return Err(SchemaError(format!("default geometry is not a geometry: {name}")));
                }
                explicit_geom = Some(name.to_string());
            }
            schema = schema.attribute(descriptor);
        }

        if let Some(geom) = explicit_geom {
            schema.default_geometry = Some(geom);
        }
        Ok(schema)
    }

    pub fn descriptors(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn descriptor(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|d| d.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|d| d.name == name)
    }

    pub fn default_geometry(&self) -> Option<&str> {
        self.default_geometry.as_deref()
    }

    pub fn default_date(&self) -> Option<&str> {
        self.default_date.as_deref()
    }

    /// True for the default geometry and default date attributes.
    pub fn is_spatio_temporal(&self, name: &str) -> bool {
        self.default_geometry() == Some(name) || self.default_date() == Some(name)
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        serde_json::to_string(self).map_err(|e| SchemaError(format!("serialize: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError(format!("deserialize: {e}")))
    }
}

/// Split on commas that are not inside `[...]`.
fn split_top_level(spec: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in spec.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&spec[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&spec[start..]);
    parts
}
