use anyhow::Result;
use simon_core::config::Config;
use std::path::Path;

pub fn run(root: &Path, port: Option<u16>, no_open: bool) -> Result<()> {
    let config = Config::load_or_default(root)?;
    for w in config.validate() {
        tracing::warn!("{}", w.message);
    }
    let port = port.unwrap_or(config.server.port);
    let name = config.project.name;

    let rt = tokio::runtime::Runtime::new()?;
    let root_buf = root.to_path_buf();

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        println!("simon UI for '{name}' → http://localhost:{actual_port}");

        tokio::select! {
            res = simon_server::serve_on(root_buf, listener, !no_open) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
