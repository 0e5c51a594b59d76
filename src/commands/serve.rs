use crate::api::Mode;
use crate::commands::Out;
use crate::{server, Config, Result};
use std::net::{Ipv4Addr, SocketAddr};

/// Serves the HTTP run trigger on all interfaces until interrupted.
pub async fn serve(config: Config, mode: Mode, port: u16) -> Result<Out<()>> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    server::serve(config, mode, addr).await?;
    Ok("Server stopped".into())
}
