//! Node property model
//!
//! Every plan node carries an ordered [`PropertyBag`]. Properties are built by
//! [`PropertyFactory`], which decorates known ShowPlan field names with display
//! metadata from the template table and keeps unknown names as plain
//! properties so no field is ever dropped.

pub mod converter;
pub mod templates;

use crate::services::showplan::counters::RunTimeCounters;
use rust_i18n::t;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::fmt;

pub use templates::{BetterValue, PropertyTemplate};

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Counters(RunTimeCounters),
    /// Expandable group: a one-line summary plus the nested properties
    Nested { summary: String, properties: PropertyBag },
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn nested(summary: impl Into<String>, properties: PropertyBag) -> Self {
        Self::Nested { summary: summary.into(), properties }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Nested { summary, .. } => Some(summary),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Integer(i) => Some(*i as f64),
            Self::Counters(c) => Some(c.display_value() as f64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_counters(&self) -> Option<&RunTimeCounters> {
        match self {
            Self::Counters(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&PropertyBag> {
        match self {
            Self::Nested { properties, .. } => Some(properties),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Boolean(b) => f.write_str(if *b { "True" } else { "False" }),
            Self::Counters(c) => write!(f, "{}", c),
            Self::Nested { summary, .. } => f.write_str(summary),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Counters(c) => c.serialize(serializer),
            Self::Nested { summary, properties } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("summary", summary)?;
                map.serialize_entry("properties", properties)?;
                map.end()
            }
            Self::List(items) => items.serialize(serializer),
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
    /// Replaces the template/localized display name when set
    pub display_override: Option<String>,
    pub order: i32,
    pub show_in_tooltip: bool,
    pub is_long_string: bool,
    pub better_value: BetterValue,
    template: Option<&'static PropertyTemplate>,
}

impl Property {
    /// Undecorated property: sorts last and never shows in tooltips
    pub fn ad_hoc(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
            display_override: None,
            order: i32::MAX,
            show_in_tooltip: false,
            is_long_string: false,
            better_value: BetterValue::None,
            template: None,
        }
    }

    fn from_template(template: &'static PropertyTemplate, value: PropertyValue) -> Self {
        Self {
            name: template.name.to_string(),
            value,
            display_override: None,
            order: template.order,
            show_in_tooltip: template.show_in_tooltip,
            is_long_string: template.is_long_string,
            better_value: template.better_value,
            template: Some(template),
        }
    }

    pub fn with_display_name(mut self, display: impl Into<String>) -> Self {
        self.display_override = Some(display.into());
        self
    }

    pub fn is_templated(&self) -> bool {
        self.template.is_some()
    }

    /// Display name in the current thread's locale
    pub fn display_name(&self) -> String {
        self.display_name_in(&crate::utils::i18n::get_locale())
    }

    /// Override, then translation, then template English, then the raw name
    pub fn display_name_in(&self, locale: &str) -> String {
        if let Some(display) = &self.display_override {
            return display.clone();
        }
        let key = format!("properties.{}.name", self.name);
        if let Some(translated) = lookup_translation(&key, locale) {
            return translated;
        }
        match self.template {
            Some(template) => template.display_name.to_string(),
            None => self.name.clone(),
        }
    }

    pub fn description_in(&self, locale: &str) -> Option<String> {
        let key = format!("properties.{}.description", self.name);
        lookup_translation(&key, locale)
    }
}

/// `t!` echoes the key (optionally prefixed by the locale) when a key is missing
fn lookup_translation(key: &str, locale: &str) -> Option<String> {
    let translated = t!(key, locale = locale).to_string();
    let prefixed = format!("{}.{}", locale, key);
    if translated == key || translated == prefixed {
        None
    } else {
        Some(translated)
    }
}

// ============================================================================
// Property bag
// ============================================================================

/// Ordered name/value collection; insertion order is preserved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    items: Vec<Property>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.items.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.get(name).map(|p| &p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add a property, replacing the value of an existing one in place
    pub fn insert(&mut self, property: Property) {
        match self.items.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.items.push(property),
        }
    }

    /// Build through the factory and insert
    pub fn set(&mut self, name: &str, value: PropertyValue) {
        self.insert(PropertyFactory::create(name, value));
    }

    pub fn remove(&mut self, name: &str) -> Option<Property> {
        let index = self.items.iter().position(|p| p.name == name)?;
        Some(self.items.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.items.iter()
    }

    /// Display order: short values first, then by order, then by name
    pub fn sorted(&self) -> Vec<&Property> {
        let mut sorted: Vec<&Property> = self.items.iter().collect();
        sorted.sort_by(|a, b| {
            a.is_long_string
                .cmp(&b.is_long_string)
                .then(a.order.cmp(&b.order))
                .then_with(|| a.name.cmp(&b.name))
        });
        sorted
    }
}

impl Serialize for PropertyBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for property in &self.items {
            map.serialize_entry(&property.name, &property.value)?;
        }
        map.end()
    }
}

// ============================================================================
// Factory
// ============================================================================

pub struct PropertyFactory;

impl PropertyFactory {
    /// Decorate `name` from the template table, or keep it as an ad-hoc property
    pub fn create(name: &str, value: PropertyValue) -> Property {
        match templates::find(name) {
            Some(template) => Property::from_template(template, value),
            None => Property::ad_hoc(name, value),
        }
    }

    /// Create from an XML attribute, typing the raw string first
    pub fn from_attribute(name: &str, raw: &str) -> Property {
        Self::create(name, converter::convert_attribute(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_property_is_decorated() {
        let property = PropertyFactory::create("EstimateRows", PropertyValue::Number(12.5));
        assert!(property.is_templated());
        assert!(property.show_in_tooltip);
        assert_eq!(property.display_name_in("en"), "Estimated Number of Rows");
    }

    #[test]
    fn test_unknown_property_is_kept_undecorated() {
        let property = PropertyFactory::create("FancyNewAttribute", PropertyValue::text("x"));
        assert!(!property.is_templated());
        assert_eq!(property.order, i32::MAX);
        assert_eq!(property.display_name_in("en"), "FancyNewAttribute");
    }

    #[test]
    fn test_display_override_wins() {
        let property = PropertyFactory::create("Predicate", PropertyValue::text("[a]>(1)"))
            .with_display_name("Custom");
        assert_eq!(property.display_name_in("en"), "Custom");
    }

    #[test]
    fn test_insert_overwrites_in_place() {
        let mut bag = PropertyBag::new();
        bag.set("NodeId", PropertyValue::Integer(1));
        bag.set("PhysicalOp", PropertyValue::text("Sort"));
        bag.set("NodeId", PropertyValue::Integer(7));

        assert_eq!(bag.len(), 2);
        assert_eq!(bag.iter().next().map(|p| p.name.as_str()), Some("NodeId"));
        assert_eq!(bag.value("NodeId").and_then(|v| v.as_f64()), Some(7.0));
    }

    #[test]
    fn test_long_strings_sort_last() {
        let mut bag = PropertyBag::new();
        bag.set("OutputList", PropertyValue::text("[a], [b]"));
        bag.set("Zeta", PropertyValue::text("ad hoc"));
        bag.set("PhysicalOp", PropertyValue::text("Sort"));
        bag.set("EstimateRows", PropertyValue::Number(1.0));

        let names: Vec<&str> = bag.sorted().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["PhysicalOp", "EstimateRows", "Zeta", "OutputList"]);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(PropertyValue::Boolean(true).to_string(), "True");
        let list = PropertyValue::List(vec![PropertyValue::text("a"), PropertyValue::Integer(2)]);
        assert_eq!(list.to_string(), "a, 2");
    }
}
