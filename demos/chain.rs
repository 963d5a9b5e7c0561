use std::{thread, time::Duration};
use strand::{spawn, then};
use tracing_subscriber::EnvFilter;

fn task() -> u64 {
    tracing::info!("task started");
    thread::sleep(Duration::from_millis(300));
    42
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_names(true)
        .init();

    let first = spawn(task);
    let _second = spawn(task);

    let doubled = then(first, |handle| handle.join() * 2);
    println!("res: {}", doubled.join());
}
