//! Processor chain capability objects, §4.4.
//!
//! Each stage is `process(sample) -> sample'`: a same-type transformation
//! applied before quality assessment. A stage returning `Err` aborts the
//! chain for that sample only.

use super::error::StreamError;
use crate::model::Sample;

pub trait SampleProcessor: Send + Sync {
    /// Stable name used in error messages and the `degraded` diagnostic.
    fn name(&self) -> &'static str;

    fn process(&self, sample: Sample) -> Result<Sample, StreamError>;
}

/// No-op stage; useful as a chain placeholder and in tests.
#[derive(Debug, Default)]
pub struct PassthroughProcessor;

impl SampleProcessor for PassthroughProcessor {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn process(&self, sample: Sample) -> Result<Sample, StreamError> {
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PayloadData, SampleType, SourceDomain, SourceKey, TelemetryPayload};

    fn sample() -> Sample {
        Sample {
            key: SourceKey::new(SourceDomain::Simulator, SampleType::Telemetry),
            timestamp_ns: 0,
            payload: PayloadData::Telemetry(TelemetryPayload::default()),
            ingest_time_ns: 0,
        }
    }

    #[test]
    fn passthrough_returns_input_unchanged() {
        let p = PassthroughProcessor;
        let s = sample();
        let out = p.process(s.clone()).unwrap();
        assert_eq!(out.timestamp_ns, s.timestamp_ns);
    }
}
