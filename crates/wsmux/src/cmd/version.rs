use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("wsmux {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: wsmux");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("WSMUX_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("WSMUX_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("wire: cbor, keys t/i/c/u/d/e");
    println!(
        "defaults: read_buffer={} max_outstanding={}",
        wsmux_peer::DEFAULT_READ_BUFFER_SIZE,
        wsmux_peer::DEFAULT_WRITE_MAX_OUTSTANDING
    );
    println!("features: websocket={}, cli=true", cfg!(feature = "websocket"));

    Ok(SUCCESS)
}
