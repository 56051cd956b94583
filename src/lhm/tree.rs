use crate::lhm::reading::{parse_sensor_value, NamedSensor, SensorValue};
use regex::Regex;
use serde_json::{Map, Value};

/// One node of the agent's sensor tree.
///
/// The agent's schema is not ours to enforce, so every field is optional on
/// the wire and defaults to empty here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawNode {
    pub id: Option<i64>,
    pub text: String,
    pub min: String,
    pub value: String,
    pub max: String,
    pub image_url: String,
    pub children: Vec<RawNode>,
    pub hardware_id: Option<String>,
    pub sensor_id: Option<String>,
    pub sensor_type: Option<String>,
}

/// Selects a child by exact text or by pattern.
#[derive(Debug, Clone, Copy)]
pub enum Matcher<'a> {
    Exact(&'a str),
    Pattern(&'a Regex),
}

impl Matcher<'_> {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Exact(expected) => text == *expected,
            Matcher::Pattern(re) => re.is_match(text),
        }
    }
}

impl<'a> From<&'a str> for Matcher<'a> {
    fn from(value: &'a str) -> Self {
        Matcher::Exact(value)
    }
}

impl<'a> From<&'a Regex> for Matcher<'a> {
    fn from(value: &'a Regex) -> Self {
        Matcher::Pattern(value)
    }
}

impl From<&Value> for RawNode {
    fn from(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let children = obj
            .get("Children")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.is_object())
                    .map(RawNode::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: obj.get("id").and_then(Value::as_i64),
            text: text_field(obj, "Text").unwrap_or_default(),
            min: text_field(obj, "Min").unwrap_or_default(),
            value: text_field(obj, "Value").unwrap_or_default(),
            max: text_field(obj, "Max").unwrap_or_default(),
            image_url: text_field(obj, "ImageURL").unwrap_or_default(),
            children,
            hardware_id: text_field(obj, "HardwareId"),
            sensor_id: text_field(obj, "SensorId"),
            sensor_type: text_field(obj, "Type"),
        }
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl RawNode {
    pub fn hardware_id(&self) -> &str {
        self.hardware_id.as_deref().unwrap_or("")
    }

    pub fn find_child<'m>(&self, matcher: impl Into<Matcher<'m>>) -> Option<&RawNode> {
        let matcher = matcher.into();
        self.children.iter().find(|c| matcher.matches(&c.text))
    }

    /// Direct children matching `pattern`, in tree order.
    pub fn find_children(&self, pattern: &Regex) -> Vec<&RawNode> {
        self.children
            .iter()
            .filter(|c| pattern.is_match(&c.text))
            .collect()
    }

    /// Parses this node's own min/value/max fields.
    pub fn sensor_value(&self) -> SensorValue {
        parse_sensor_value(&self.min, &self.value, &self.max)
    }

    pub fn named_sensor(&self) -> NamedSensor {
        NamedSensor {
            name: self.text.clone(),
            value: self.sensor_value(),
        }
    }

    /// First sensor in `category` matching any of `candidates`, tried in order.
    pub fn first_sensor_in_category(
        &self,
        category: &str,
        candidates: &[Matcher<'_>],
    ) -> Option<&RawNode> {
        let cat = self.find_child(category)?;
        candidates.iter().find_map(|m| cat.find_child(*m))
    }

    /// Two-level lookup; a miss at either level is the zero value.
    pub fn sensor_in_category<'m>(
        &self,
        category: &str,
        sensor: impl Into<Matcher<'m>>,
    ) -> SensorValue {
        self.first_sensor_in_category(category, &[sensor.into()])
            .map(RawNode::sensor_value)
            .unwrap_or_default()
    }
}
