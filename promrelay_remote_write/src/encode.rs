use bytes::Bytes;
use promrelay_resources::WriteQuery;
use prost::Message;
use snafu::{ResultExt, Snafu};

use crate::proto;

#[derive(Debug, Snafu)]
pub enum EncodeError {
    #[snafu(display("failed to serialize write request"))]
    Serialize { source: prost::EncodeError },
    #[snafu(display("failed to deserialize write request"))]
    Deserialize { source: prost::DecodeError },
    #[snafu(display("failed to compress write request"))]
    Compress { source: snap::Error },
    #[snafu(display("failed to decompress write request"))]
    Decompress { source: snap::Error },
}

type Result<T, E = EncodeError> = std::result::Result<T, E>;

/// Encodes a batch of write queries as a remote-write payload.
///
/// Each query becomes one `TimeSeries` with its labels sorted by name (as
/// the remote-write spec requires) and timestamps converted from
/// nanoseconds to milliseconds. The protobuf message is compressed with
/// raw snappy.
pub fn encode(queries: &[WriteQuery]) -> Result<Bytes> {
    let request = to_write_request(queries);

    let mut buf = Vec::with_capacity(request.encoded_len());
    request.encode(&mut buf).context(SerializeSnafu)?;

    let compressed = snap::raw::Encoder::new()
        .compress_vec(&buf)
        .context(CompressSnafu)?;

    Ok(compressed.into())
}

/// Decodes a remote-write payload back into a `WriteRequest`.
///
/// The inverse of [`encode`]; used by diagnostics and by tests standing in
/// for the remote endpoint.
pub fn decode(payload: &[u8]) -> Result<proto::WriteRequest> {
    let decompressed = snap::raw::Decoder::new()
        .decompress_vec(payload)
        .context(DecompressSnafu)?;

    proto::WriteRequest::decode(decompressed.as_slice()).context(DeserializeSnafu)
}

fn to_write_request(queries: &[WriteQuery]) -> proto::WriteRequest {
    let timeseries = queries
        .iter()
        .map(|query| proto::TimeSeries {
            labels: build_labels(query),
            samples: build_samples(query),
        })
        .collect();

    proto::WriteRequest { timeseries }
}

fn build_labels(query: &WriteQuery) -> Vec<proto::Label> {
    let mut labels: Vec<_> = query
        .tags()
        .iter()
        .map(|tag| proto::Label {
            name: String::from_utf8_lossy(&tag.name).into_owned(),
            value: String::from_utf8_lossy(&tag.value).into_owned(),
        })
        .collect();

    labels.sort_by(|a, b| a.name.cmp(&b.name));
    labels
}

fn build_samples(query: &WriteQuery) -> Vec<proto::Sample> {
    query
        .datapoints()
        .iter()
        .map(|datapoint| proto::Sample {
            value: datapoint.value,
            timestamp: datapoint.timestamp_nanos / 1_000_000,
        })
        .collect()
}
