use std::time::Instant;

use ccnping::{
    configuration::{parse_or_exit, ServerConfiguration},
    face::udp::UdpProducer,
    packets::Signer,
    responder::{print_responder_stats, Responder},
};

fn main() {
    env_logger::init();

    let conf: ServerConfiguration = parse_or_exit(ServerConfiguration::usage_check);
    log::info!("Configuration valid. Starting up...");

    let (prefix, display_prefix) = match (conf.prefix_name(), conf.prefix_str()) {
        (Ok(prefix), Ok(display)) => (prefix, display.to_string()),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("ccnpingserver: {}", e);
            std::process::exit(1);
        }
    };

    let signer = match conf.hmac_key() {
        Ok(key) => Signer::from_key(key),
        Err(e) => {
            eprintln!("ccnpingserver: {}", e);
            std::process::exit(1);
        }
    };

    let responder = Responder::new(&prefix, Some(conf.freshness()));

    // Claim the address while errors can still reach the terminal.
    let socket = match UdpProducer::bind_std(conf.listen) {
        Ok(socket) => socket,
        Err(e) => {
            eprintln!(
                "ccnpingserver: cannot register prefix {} on {}: {}",
                responder.filter_prefix(),
                conf.listen,
                e
            );
            std::process::exit(1);
        }
    };
    log::info!("Serving {} on {}", responder.filter_prefix(), conf.listen);

    if conf.daemon {
        detach();
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("ccnpingserver: cannot start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = runtime.block_on(serve(conf, display_prefix, socket, signer, responder));
    std::process::exit(code);
}

#[cfg(unix)]
fn detach() {
    if let Err(e) = ccnping::daemon::daemonize() {
        eprintln!("ccnpingserver: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(unix))]
fn detach() {
    log::warn!("Daemon mode is not supported on this platform, staying in the foreground");
}

async fn serve(
    conf: ServerConfiguration,
    display_prefix: String,
    socket: std::net::UdpSocket,
    signer: Signer,
    responder: Responder,
) -> i32 {
    let start_time = Instant::now();

    let mut face = match UdpProducer::from_std(socket, signer) {
        Ok(face) => face,
        Err(e) => {
            log::error!("Cannot set up face: {}", e);
            return 1;
        }
    };

    let counters = responder.counters();
    face.register_prefix(responder.filter_prefix().clone(), Box::new(responder));

    tokio::select! {
        result = face.run() => {
            match result {
                Ok(()) => 0,
                Err(e) => {
                    log::error!("Face failed: {}", e);
                    eprintln!("ccnpingserver: {}", e);
                    1
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            print_responder_stats(&display_prefix, &counters, start_time, conf.format);
            0
        }
    }
}
