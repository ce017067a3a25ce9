use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "abctl")]
#[command(about = "Operator CLI for the A/B traffic router", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the router to reload its configuration file
    Reload {
        #[arg(short, long, default_value = "http://127.0.0.1:8080/abtest_config_reload")]
        url: String,
    },
    /// Call the liveness endpoint
    Check {
        #[arg(short, long, default_value = "http://127.0.0.1:8080/slb_check")]
        url: String,
    },
    /// Signal the process named in the pid file
    Signal {
        action: Action,
        #[arg(short, long, default_value = "/tmp/abtest.sock")]
        pid_file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    /// Graceful stop (SIGTERM)
    Stop,
    /// Configuration reload (SIGUSR1)
    Reload,
    /// Hot restart on the same socket (SIGUSR2)
    Restart,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Reload { url } | Commands::Check { url } => {
            let res = reqwest::Client::new().get(&url).send().await?;
            print_response(res).await?;
        }
        Commands::Signal { action, pid_file } => {
            let pid = read_pid(&pid_file)?;
            send_signal(pid, action)?;
            println!("signalled {pid}");
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        eprintln!("Error: router returned status {status}: {text}");
        std::process::exit(1);
    }
    println!("{text}");
    Ok(())
}

fn read_pid(path: &Path) -> Result<i32, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read pid file {}: {e}", path.display()))?;
    let pid = contents
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("pid file {} is malformed: {e}", path.display()))?;
    if pid <= 0 {
        return Err(format!("pid file {} holds invalid pid {pid}", path.display()).into());
    }
    Ok(pid)
}

#[cfg(unix)]
fn send_signal(pid: i32, action: Action) -> Result<(), Box<dyn std::error::Error>> {
    let signal = match action {
        Action::Stop => libc::SIGTERM,
        Action::Reload => libc::SIGUSR1,
        Action::Restart => libc::SIGUSR2,
    };
    // SAFETY: kill has no memory-safety preconditions.
    if unsafe { libc::kill(pid, signal) } == -1 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_signal(_pid: i32, _action: Action) -> Result<(), Box<dyn std::error::Error>> {
    Err("signals require a unix platform".into())
}
