use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcUpstreamError {
    #[error("failed to connect to upstream at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: jsonrpsee::core::Error,
    },

    #[error("upstream RPC call `{method}` failed: {source}")]
    Call {
        method: &'static str,
        #[source]
        source: jsonrpsee::core::Error,
    },
}
