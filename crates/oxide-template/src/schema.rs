//! Property type descriptors.
//!
//! Parameter objects are described ahead of time by registering a
//! [`TypeDescriptor`] per type in a [`SchemaRegistry`]. The registry then
//! answers "what is the type of `order.lines[0].price`" without inspecting
//! any live value.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// The declared type of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    /// Boolean.
    Bool,
    /// Integer.
    Int,
    /// Floating point.
    Float,
    /// Exact decimal.
    Decimal,
    /// Text.
    Text,
    /// Binary data.
    Bytes,
    /// A sequence of elements of the given type.
    List(Box<PropertyType>),
    /// A map with string keys and values of the given type.
    Map(Box<PropertyType>),
    /// A registered type, by name.
    Object(String),
    /// Unknown or dynamic.
    Any,
}

impl PropertyType {
    /// Shorthand for `List(elem)`.
    #[must_use]
    pub fn list(elem: Self) -> Self {
        Self::List(Box::new(elem))
    }

    /// Shorthand for `Map(value)`.
    #[must_use]
    pub fn map(value: Self) -> Self {
        Self::Map(Box::new(value))
    }

    /// Shorthand for `Object(name)`.
    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self::Object(name.into())
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Decimal => write!(f, "decimal"),
            Self::Text => write!(f, "text"),
            Self::Bytes => write!(f, "bytes"),
            Self::List(elem) => write!(f, "list<{elem}>"),
            Self::Map(value) => write!(f, "map<{value}>"),
            Self::Object(name) => write!(f, "{name}"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Describes the readable properties of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    properties: BTreeMap<String, PropertyType>,
}

impl TypeDescriptor {
    /// Creates an empty descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Declares a property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.properties.insert(name.into(), ty);
        self
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type of a direct property.
    #[must_use]
    pub fn property_type(&self, name: &str) -> Option<&PropertyType> {
        self.properties.get(name)
    }

    /// Returns the property names in sorted order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

/// One segment of a property path such as `lines[0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySegment<'a> {
    /// The property name.
    pub name: &'a str,
    /// The bracketed index, if any.
    pub index: Option<&'a str>,
}

/// Splits `a.b[0].c` into its segments.
#[derive(Debug, Clone)]
pub struct PropertyTokenizer<'a> {
    rest: Option<&'a str>,
}

impl<'a> PropertyTokenizer<'a> {
    /// Creates a tokenizer over a dotted path.
    #[must_use]
    pub const fn new(path: &'a str) -> Self {
        Self { rest: Some(path) }
    }
}

impl<'a> Iterator for PropertyTokenizer<'a> {
    type Item = PropertySegment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.rest?;
        let (head, tail) = match path.find('.') {
            Some(dot) => (&path[..dot], Some(&path[dot + 1..])),
            None => (path, None),
        };
        self.rest = tail;
        let segment = match head.find('[') {
            Some(open) => PropertySegment {
                name: &head[..open],
                index: Some(head[open + 1..].trim_end_matches(']')),
            },
            None => PropertySegment {
                name: head,
                index: None,
            },
        };
        Some(segment)
    }
}

/// Registry of type descriptors.
///
/// # Example
///
/// ```
/// use oxide_template::schema::{PropertyType, SchemaRegistry, TypeDescriptor};
///
/// let mut registry = SchemaRegistry::new();
/// registry.register(TypeDescriptor::new("Order").property("lines", PropertyType::list(PropertyType::object("Line"))));
/// registry.register(TypeDescriptor::new("Line").property("price", PropertyType::Decimal));
///
/// assert_eq!(registry.getter_type("Order", "lines[0].price"), Some(PropertyType::Decimal));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor, replacing any previous one with the same name.
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    /// Returns the descriptor for a type.
    #[must_use]
    pub fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    /// Resolves the type of a property path starting at `type_name`.
    ///
    /// An indexed segment over a list resolves to the element type, over a
    /// map to the value type.
    #[must_use]
    pub fn getter_type(&self, type_name: &str, path: &str) -> Option<PropertyType> {
        let mut current = PropertyType::object(type_name);
        for segment in PropertyTokenizer::new(path) {
            current = match current {
                PropertyType::Object(name) => self
                    .types
                    .get(&name)?
                    .property_type(segment.name)?
                    .clone(),
                PropertyType::Map(value) => *value,
                PropertyType::Any => return Some(PropertyType::Any),
                _ => return None,
            };
            if segment.index.is_some() {
                current = match current {
                    PropertyType::List(elem) => *elem,
                    PropertyType::Map(value) => *value,
                    other => other,
                };
            }
        }
        Some(current)
    }

    /// Returns true if the path resolves.
    #[must_use]
    pub fn has_getter(&self, type_name: &str, path: &str) -> bool {
        self.getter_type(type_name, path).is_some()
    }

    /// Finds the declared spelling of a property path, ignoring case.
    ///
    /// With `camel_case`, underscores are dropped first so `user_name`
    /// matches `userName`. Resolution stops at the first level that is not
    /// a registered type; `None` if even the first segment is unknown.
    #[must_use]
    pub fn find_property(&self, type_name: &str, name: &str, camel_case: bool) -> Option<String> {
        let name = if camel_case {
            name.replace('_', "")
        } else {
            name.to_string()
        };
        let mut found: Vec<&str> = Vec::new();
        let mut current = Some(type_name.to_string());
        for part in name.split('.') {
            let Some(descriptor) = current.as_deref().and_then(|t| self.types.get(t)) else {
                break;
            };
            let Some((declared, ty)) = descriptor
                .properties
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(part))
            else {
                break;
            };
            found.push(declared);
            current = match ty {
                PropertyType::Object(t) => Some(t.clone()),
                _ => None,
            };
        }
        if found.is_empty() {
            None
        } else {
            Some(found.join("."))
        }
    }
}
