use std::{thread, time::Duration};
use strand::{spawn, when_any};
use tracing_subscriber::EnvFilter;

fn task(millis: u64) -> u64 {
    tracing::info!(millis, "task started");
    thread::sleep(Duration::from_millis(millis));
    millis
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_names(true)
        .init();

    let slow = spawn(|| task(600));
    let fast = spawn(|| task(200));

    let (index, (slow, fast)) = when_any((slow, fast)).join().into_parts();
    println!("winner: {}", index);

    let fast = fast.then(|handle| handle.join() * 2);
    println!("res: {}", fast.join());
    println!("slow branch still finished with {}", slow.join());
}
