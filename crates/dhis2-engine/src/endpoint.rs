//! Known DHIS2 endpoints and the response shape each one returns.

/// Endpoints every connection exposes even without per-endpoint configuration.
pub const DEFAULT_ENDPOINTS: [&str; 4] = [
    "analytics",
    "dataValueSets",
    "trackedEntityInstances",
    "events",
];

/// Where the flattened attributes of a nested record live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestedFields {
    /// Array field on each record holding the attribute objects.
    pub field: &'static str,
    /// Identifier field inside an attribute object.
    pub id_field: &'static str,
    /// Optional display label inside an attribute object.
    pub label_field: Option<&'static str>,
    pub value_field: &'static str,
}

/// Response shape, which selects the normalizer strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// `headers` + positional `rows` + `metadata.items`.
    Matrix,
    /// Named array of flat objects.
    FlatArray { collection: String },
    /// Named array of records carrying a nested attribute array.
    NestedRecord {
        collection: String,
        nested: NestedFields,
    },
}

const TEI_ATTRIBUTES: NestedFields = NestedFields {
    field: "attributes",
    id_field: "attribute",
    label_field: Some("displayName"),
    value_field: "value",
};

const EVENT_DATA_VALUES: NestedFields = NestedFields {
    field: "dataValues",
    id_field: "dataElement",
    label_field: None,
    value_field: "value",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointProfile {
    pub name: String,
    pub shape: Shape,
    /// Drained page by page with `page`/`pageSize`.
    pub paged: bool,
    /// Needs a time window; a default one is injected when absent.
    pub period_window: bool,
    /// DHIS2 rejects requests without at least one `dimension`.
    pub requires_dimension: bool,
}

/// Canonical form of a table or endpoint name: surrounding whitespace and
/// slashes dropped.
pub fn endpoint_key(name: &str) -> &str {
    name.trim().trim_matches('/')
}

impl EndpointProfile {
    pub fn for_endpoint(name: &str) -> Self {
        let name = endpoint_key(name);
        let (shape, paged, period_window, requires_dimension) = match name {
            "analytics" => (Shape::Matrix, false, true, true),
            "dataValueSets" => (
                Shape::FlatArray {
                    collection: "dataValues".to_string(),
                },
                false,
                true,
                false,
            ),
            "trackedEntityInstances" => (
                Shape::NestedRecord {
                    collection: name.to_string(),
                    nested: TEI_ATTRIBUTES,
                },
                true,
                false,
                false,
            ),
            "events" => (
                Shape::NestedRecord {
                    collection: name.to_string(),
                    nested: EVENT_DATA_VALUES,
                },
                true,
                false,
                false,
            ),
            other => (
                Shape::FlatArray {
                    collection: other.to_string(),
                },
                true,
                false,
                false,
            ),
        };
        Self {
            name: name.to_string(),
            shape,
            paged,
            period_window,
            requires_dimension,
        }
    }

    /// Name of the array holding the data rows, if the shape has one.
    pub fn collection(&self) -> Option<&str> {
        match &self.shape {
            Shape::Matrix => None,
            Shape::FlatArray { collection } | Shape::NestedRecord { collection, .. } => {
                Some(collection.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analytics_is_matrix() {
        let profile = EndpointProfile::for_endpoint("analytics");
        assert_eq!(profile.shape, Shape::Matrix);
        assert!(profile.requires_dimension);
        assert!(profile.period_window);
        assert!(!profile.paged);
        assert_eq!(profile.collection(), None);
    }

    #[test]
    fn data_value_sets_are_flat() {
        let profile = EndpointProfile::for_endpoint("dataValueSets");
        assert_eq!(profile.collection(), Some("dataValues"));
        assert!(profile.period_window);
        assert!(!profile.paged);
    }

    #[test]
    fn tracked_entities_and_events_are_nested() {
        let tei = EndpointProfile::for_endpoint("trackedEntityInstances");
        assert!(matches!(tei.shape, Shape::NestedRecord { nested, .. } if nested.field == "attributes"));
        assert!(tei.paged);

        let events = EndpointProfile::for_endpoint("/events/");
        assert_eq!(events.name, "events");
        assert!(matches!(events.shape, Shape::NestedRecord { nested, .. } if nested.id_field == "dataElement"));
    }

    #[test]
    fn unknown_endpoint_is_flat_collection_of_same_name() {
        let profile = EndpointProfile::for_endpoint("organisationUnits");
        assert_eq!(profile.collection(), Some("organisationUnits"));
        assert!(profile.paged);
        assert!(!profile.period_window);
    }
}
