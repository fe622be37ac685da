//! Descriptor validation
//!
//! Only the (type, temporality) pairs listed in `EXPORTABLE` reach the wire.
//! The list is explicit so that new enum values stay rejected until added here.

use crate::data::types::{MetricDescriptor, MetricType, Temporality};

/// Every exportable (type, temporality) combination
pub const EXPORTABLE: [(MetricType, Temporality); 10] = [
    (MetricType::MonotonicInt64, Temporality::Cumulative),
    (MetricType::MonotonicDouble, Temporality::Cumulative),
    (MetricType::Histogram, Temporality::Cumulative),
    (MetricType::Summary, Temporality::Cumulative),
    (MetricType::Int64, Temporality::Delta),
    (MetricType::Double, Temporality::Delta),
    (MetricType::Int64, Temporality::Instantaneous),
    (MetricType::Double, Temporality::Instantaneous),
    (MetricType::Int64, Temporality::Cumulative),
    (MetricType::Double, Temporality::Cumulative),
];

/// Whether a metric with this descriptor may be exported
pub fn is_exportable(descriptor: Option<&MetricDescriptor>) -> bool {
    let Some(desc) = descriptor else {
        return false;
    };
    if desc.metric_type == MetricType::Invalid || desc.temporality == Temporality::Invalid {
        return false;
    }
    EXPORTABLE.contains(&(desc.metric_type, desc.temporality))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [MetricType; 7] = [
        MetricType::Invalid,
        MetricType::MonotonicInt64,
        MetricType::MonotonicDouble,
        MetricType::Int64,
        MetricType::Double,
        MetricType::Histogram,
        MetricType::Summary,
    ];

    const ALL_TEMPORALITIES: [Temporality; 4] = [
        Temporality::Invalid,
        Temporality::Cumulative,
        Temporality::Delta,
        Temporality::Instantaneous,
    ];

    fn descriptor(metric_type: MetricType, temporality: Temporality) -> MetricDescriptor {
        MetricDescriptor {
            name: "test_metric".to_string(),
            description: String::new(),
            unit: "1".to_string(),
            metric_type,
            temporality,
        }
    }

    #[test]
    fn test_valid_combinations() {
        for (ty, temp) in EXPORTABLE {
            assert!(
                is_exportable(Some(&descriptor(ty, temp))),
                "{}/{} should be exportable",
                ty.as_str(),
                temp.as_str()
            );
        }
    }

    #[test]
    fn test_known_invalid_combinations() {
        let invalid = [
            (MetricType::MonotonicInt64, Temporality::Delta),
            (MetricType::MonotonicDouble, Temporality::Delta),
            (MetricType::Histogram, Temporality::Delta),
            (MetricType::Summary, Temporality::Delta),
            (MetricType::Invalid, Temporality::Cumulative),
            (MetricType::Int64, Temporality::Invalid),
            (MetricType::Invalid, Temporality::Invalid),
        ];
        for (ty, temp) in invalid {
            assert!(
                !is_exportable(Some(&descriptor(ty, temp))),
                "{}/{} should not be exportable",
                ty.as_str(),
                temp.as_str()
            );
        }
    }

    #[test]
    fn test_every_combination_outside_table_rejected() {
        let mut accepted = 0;
        for ty in ALL_TYPES {
            for temp in ALL_TEMPORALITIES {
                let expected = EXPORTABLE.contains(&(ty, temp));
                assert_eq!(is_exportable(Some(&descriptor(ty, temp))), expected);
                if expected {
                    accepted += 1;
                }
            }
        }
        assert_eq!(accepted, 10);
    }

    #[test]
    fn test_default_descriptor_rejected() {
        assert!(!is_exportable(Some(&MetricDescriptor::default())));
    }

    #[test]
    fn test_absent_descriptor_rejected() {
        assert!(!is_exportable(None));
    }
}
