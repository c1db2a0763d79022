use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Listening host
    #[arg(long, env = "RESTFS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Listening port
    #[arg(short, long, env = "RESTFS_PORT", default_value_t = 8968)]
    pub port: u16,

    /// Directory served as the resource root
    #[arg(long, env = "RESTFS_ROOTDIR", default_value = "/var/lib/restfs")]
    pub root: String,

    /// Public url used to build listing links
    #[arg(long, env = "RESTFS_PUBLIC_URL", default_value = "http://127.0.0.1:8968")]
    pub url: String,
}
