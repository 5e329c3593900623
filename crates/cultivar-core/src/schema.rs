//! The wine feature schema: 13 real-valued chemical measurements in model order.
//!
//! Field order is fixed for the lifetime of a deployed model. Every other
//! component (normalizer, model loader, CLI, columnar conversion) reads
//! names and positions from [`FIELDS`].

/// Number of features a record must supply.
pub const ARITY: usize = 13;

/// One named feature column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureField {
    pub name: &'static str,
    pub description: &'static str,
    /// (min, max) observed in the UCI wine dataset. Documentation only;
    /// values outside the range are still accepted.
    pub example_range: (f64, f64),
}

/// Feature fields in the order the model expects them.
pub const FIELDS: [FeatureField; ARITY] = [
    FeatureField {
        name: "alcohol",
        description: "Alcohol (% vol)",
        example_range: (11.03, 14.83),
    },
    FeatureField {
        name: "malic_acid",
        description: "Malic acid (g/l)",
        example_range: (0.74, 5.80),
    },
    FeatureField {
        name: "ash",
        description: "Ash (g/l)",
        example_range: (1.36, 3.23),
    },
    FeatureField {
        name: "alcalinity_of_ash",
        description: "Alcalinity of ash",
        example_range: (10.6, 30.0),
    },
    FeatureField {
        name: "magnesium",
        description: "Magnesium (mg/l)",
        example_range: (70.0, 162.0),
    },
    FeatureField {
        name: "total_phenols",
        description: "Total phenols",
        example_range: (0.98, 3.88),
    },
    FeatureField {
        name: "flavanoids",
        description: "Flavanoids",
        example_range: (0.34, 5.08),
    },
    FeatureField {
        name: "nonflavanoid_phenols",
        description: "Nonflavanoid phenols",
        example_range: (0.13, 0.66),
    },
    FeatureField {
        name: "proanthocyanins",
        description: "Proanthocyanins",
        example_range: (0.41, 3.58),
    },
    FeatureField {
        name: "color_intensity",
        description: "Color intensity",
        example_range: (1.28, 13.0),
    },
    FeatureField {
        name: "hue",
        description: "Hue",
        example_range: (0.48, 1.71),
    },
    FeatureField {
        name: "od280_od315_of_diluted_wines",
        description: "OD280/OD315 of diluted wines",
        example_range: (1.27, 4.00),
    },
    FeatureField {
        name: "proline",
        description: "Proline (mg/l)",
        example_range: (278.0, 1680.0),
    },
];

/// Iterate over field names in schema order.
pub fn names() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|f| f.name)
}

pub fn field(i: usize) -> Option<&'static FeatureField> {
    FIELDS.get(i)
}

/// Position of a field by name.
pub fn position(name: &str) -> Option<usize> {
    FIELDS.iter().position(|f| f.name == name)
}
