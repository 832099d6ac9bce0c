//! Declarative markers and the marker inventory.
//!
//! Markers are the metadata that opt methods (or the group type itself) into
//! processor behavior. Instead of reflecting over source annotations, a test
//! group registers its declared type hierarchy explicitly (see
//! [`GroupMeta`](crate::group::GroupMeta)), and the inventory scan turns those
//! declarations into one element-to-markers map per interested processor.
//!
//! The scan runs exactly once per group run, before any phase executes, and
//! the resulting [`MarkerInventory`] is read-only from then on.

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
};

use crate::{error::ConfigError, group::GroupMeta};

/// The name of a declarative marker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Marker(Cow<'static, str>);

/// Marks a method as a test case.
pub const TEST_CASE: Marker = Marker::from_static("test-case");
/// Marks a method as explicitly not a test case.
pub const NOT_TEST_CASE: Marker = Marker::from_static("not-test-case");
/// Marks a method as a group-wide setup hook.
pub const BEFORE_GROUP: Marker = Marker::from_static("before-group");
/// Marks a method as a group-wide teardown hook.
pub const AFTER_GROUP: Marker = Marker::from_static("after-group");
/// Marks a type as bearing a test group.
pub const TEST_GROUP: Marker = Marker::from_static("test-group");

impl Marker {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Marker {
    fn from(value: &'static str) -> Self {
        Self(value.into())
    }
}

impl From<String> for Marker {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A code element that can carry markers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Element {
    /// A declared type or interface in the group's hierarchy.
    Type(Cow<'static, str>),
    /// A method declared on a type in the hierarchy.
    Method {
        owner: Cow<'static, str>,
        name: Cow<'static, str>,
    },
}

impl Element {
    /// The method name, if this element is a method.
    pub fn method_name(&self) -> Option<&str> {
        match self {
            Element::Type(_) => None,
            Element::Method { name, .. } => Some(name),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Type(name) => f.write_str(name),
            Element::Method { owner, name } => write!(f, "{owner}::{name}"),
        }
    }
}

/// A processor's static declaration of which markers it cares about.
#[derive(Debug, Clone, Copy)]
pub struct MarkerInterest {
    /// The markers the inventory should collect for this processor.
    pub markers: &'static [Marker],
    /// When set, a single element carrying more than one distinct marker
    /// from `markers` is a configuration error.
    pub mutually_exclusive: bool,
}

impl MarkerInterest {
    /// No interest at all; the inventory skips this processor.
    pub const NONE: MarkerInterest = MarkerInterest {
        markers: &[],
        mutually_exclusive: false,
    };

    pub const fn of(markers: &'static [Marker]) -> Self {
        Self {
            markers,
            mutually_exclusive: false,
        }
    }

    pub const fn exclusive(markers: &'static [Marker]) -> Self {
        Self {
            markers,
            mutually_exclusive: true,
        }
    }
}

/// The markers found for one processor, keyed by carrying element.
pub type ElementMarkers = BTreeMap<Element, BTreeSet<Marker>>;

/// Per-processor element-to-markers maps for one group run.
#[derive(Debug, Default)]
pub struct MarkerInventory {
    per_processor: HashMap<&'static str, ElementMarkers>,
}

impl MarkerInventory {
    /// Walk the declared hierarchy and collect, for every interested
    /// processor, the elements carrying markers from its interest set.
    ///
    /// Interfaces and ancestor types are part of [`GroupMeta::types`], so the
    /// walk covers the full hierarchy. Fails when a mutually-exclusive
    /// interest set finds more than one of its markers on a single element.
    pub fn scan(
        meta: &GroupMeta,
        interests: impl IntoIterator<Item = (&'static str, MarkerInterest)>,
    ) -> Result<MarkerInventory, ConfigError> {
        let mut inventory = MarkerInventory::default();

        for (processor, interest) in interests {
            if interest.markers.is_empty() {
                continue;
            }

            let mut elements = ElementMarkers::new();
            for ty in &meta.types {
                collect(&mut elements, Element::Type(ty.name.clone()), &ty.markers, &interest);
                for method in &ty.methods {
                    let element = Element::Method {
                        owner: ty.name.clone(),
                        name: method.name.clone(),
                    };
                    collect(&mut elements, element, &method.markers, &interest);
                }
            }

            if interest.mutually_exclusive {
                for (element, markers) in &elements {
                    if markers.len() > 1 {
                        return Err(ConfigError::ExclusiveMarkers {
                            processor,
                            element: element.clone(),
                            markers: markers.iter().cloned().collect(),
                        });
                    }
                }
            }

            inventory.per_processor.insert(processor, elements);
        }

        Ok(inventory)
    }

    /// The element map collected for a processor, if it declared interest.
    pub fn for_processor(&self, processor: &str) -> Option<&ElementMarkers> {
        self.per_processor.get(processor)
    }

    /// The names of all methods carrying `marker` in a processor's map,
    /// deduplicated and sorted.
    pub fn method_names_with(&self, processor: &str, marker: &Marker) -> BTreeSet<String> {
        let Some(elements) = self.for_processor(processor) else {
            return BTreeSet::new();
        };
        elements
            .iter()
            .filter(|(_, markers)| markers.contains(marker))
            .filter_map(|(element, _)| element.method_name())
            .map(str::to_owned)
            .collect()
    }

    /// The single marker collected for `element` in a processor's map.
    ///
    /// # Panics
    ///
    /// Panics when the element carries more than one marker. Asking for the
    /// unique marker of a multi-marker element is a processor implementation
    /// bug, not a user configuration problem.
    pub fn unique_marker(&self, processor: &str, element: &Element) -> Option<&Marker> {
        let markers = self.for_processor(processor)?.get(element)?;
        if markers.len() > 1 {
            panic!(
                "element `{element}` carries {} markers for processor `{processor}`, \
                 expected at most one",
                markers.len()
            );
        }
        markers.iter().next()
    }
}

fn collect(
    elements: &mut ElementMarkers,
    element: Element,
    carried: &[Marker],
    interest: &MarkerInterest,
) {
    let matching: BTreeSet<Marker> = carried
        .iter()
        .filter(|marker| interest.markers.contains(marker))
        .cloned()
        .collect();
    if !matching.is_empty() {
        elements.entry(element).or_default().extend(matching);
    }
}
