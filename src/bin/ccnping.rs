use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use ccnping::{
    configuration::{parse_or_exit, ClientConfiguration},
    face::udp::UdpConsumer,
    session::{Numbering, PingSession, SessionEnd, SessionOptions},
    time::Printer,
};

/// Exit status after an interrupt, as for a process killed by SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

/// Exit status when the session aborts on a runtime error.
const EXIT_SESSION_FAILED: i32 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let conf: ClientConfiguration = parse_or_exit(ClientConfiguration::usage_check);
    log::info!("Configuration valid. Starting up...");

    std::process::exit(run(conf).await);
}

async fn run(conf: ClientConfiguration) -> i32 {
    let (prefix, display_prefix) = match (conf.prefix_name(), conf.prefix_str()) {
        (Ok(prefix), Ok(display)) => (prefix, display.to_string()),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("ccnping: {}", e);
            return 1;
        }
    };

    let verify_key = match conf.hmac_key() {
        Ok(key) => key,
        Err(e) => {
            eprintln!("ccnping: {}", e);
            return 1;
        }
    };

    let local = match conf.remote.ip() {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let mut face = match UdpConsumer::connect(local, conf.remote, verify_key).await {
        Ok(face) => face,
        Err(e) => {
            eprintln!("ccnping: cannot reach {}: {}", conf.remote, e);
            return 1;
        }
    };

    let mut options = SessionOptions::new(prefix);
    options.display_prefix = display_prefix;
    options.identifier = conf.identifier.clone();
    options.interval = conf.interval();
    options.limit = conf.limit();
    options.numbering = Numbering::from_start(conf.start_number());
    options.lifetime = conf.lifetime();
    options.allow_caching = conf.allow_caching;
    options.printer = Printer::new(conf.timestamp);

    let mut session = PingSession::new(options);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let result = session.run(&mut face, shutdown).await;
    session.statistics().snapshot().print(conf.format);

    match result {
        Ok(SessionEnd::Completed) => 0,
        Ok(SessionEnd::Interrupted) => EXIT_INTERRUPTED,
        Err(e) => {
            eprintln!("ccnping: {}", e);
            EXIT_SESSION_FAILED
        }
    }
}
