//! WriteRequest serialization and snappy block compression

use prost::Message;

use super::error::EncodeError;
use super::proto;
use crate::data::types::TimeSeries;

/// A serialized batch ready for transmission
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    pub body: Vec<u8>,
    /// Body is snappy block-compressed
    pub compressed: bool,
    pub series: usize,
    pub samples: usize,
}

pub fn write_request(series: &[TimeSeries]) -> proto::WriteRequest {
    proto::WriteRequest {
        timeseries: series
            .iter()
            .map(|ts| proto::TimeSeries {
                labels: ts
                    .labels
                    .iter()
                    .map(|l| proto::Label {
                        name: l.name.clone(),
                        value: l.value.clone(),
                    })
                    .collect(),
                samples: ts
                    .samples
                    .iter()
                    .map(|s| proto::Sample {
                        value: s.value,
                        timestamp: s.timestamp_ms,
                    })
                    .collect(),
            })
            .collect(),
    }
}

pub fn encode_batch(series: &[TimeSeries], compression: bool) -> Result<EncodedBatch, EncodeError> {
    let raw = write_request(series).encode_to_vec();
    let body = if compression {
        snap::raw::Encoder::new().compress_vec(&raw)?
    } else {
        raw
    };
    Ok(EncodedBatch {
        body,
        compressed: compression,
        series: series.len(),
        samples: series.iter().map(|ts| ts.samples.len()).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{Label, Sample};

    fn series() -> Vec<TimeSeries> {
        vec![TimeSeries {
            labels: vec![Label::new("__name__", "up"), Label::new("job", "api")],
            samples: vec![
                Sample { timestamp_ms: 1000, value: 1.0 },
                Sample { timestamp_ms: 2000, value: 0.0 },
            ],
        }]
    }

    #[test]
    fn test_compressed_body_decodes_to_request() {
        let batch = encode_batch(&series(), true).unwrap();
        assert!(batch.compressed);
        assert_eq!(batch.series, 1);
        assert_eq!(batch.samples, 2);

        let raw = snap::raw::Decoder::new().decompress_vec(&batch.body).unwrap();
        let request = proto::WriteRequest::decode(raw.as_slice()).unwrap();
        assert_eq!(request, write_request(&series()));
        assert_eq!(request.timeseries[0].labels[1].value, "api");
        assert_eq!(request.timeseries[0].samples[1].timestamp, 2000);
    }

    #[test]
    fn test_uncompressed_body_is_plain_protobuf() {
        let batch = encode_batch(&series(), false).unwrap();
        assert!(!batch.compressed);
        let request = proto::WriteRequest::decode(batch.body.as_slice()).unwrap();
        assert_eq!(request.timeseries.len(), 1);
    }

    #[test]
    fn test_empty_batch() {
        let batch = encode_batch(&[], true).unwrap();
        assert_eq!(batch.series, 0);
        assert_eq!(batch.samples, 0);
    }
}
