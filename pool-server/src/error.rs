use thiserror::Error;

#[derive(Error, Debug)]
pub enum TcpServerError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("coordinator handle was not wired before start()")]
    CoordinatorNotWired,
}
