#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::Result;
use pretty_assertions::assert_eq;
use serial_expect::control::ControlChannel;
use serial_expect::error::Error;

#[tokio::test]
async fn commands_are_echoed_back() -> Result<()> {
    let helper = common::echo_helper("echo");

    let mut channel = ControlChannel::new(helper, "/dev/null");
    channel.start()?;

    let answer = channel
        .send_command(&["start", "dc"])
        .await?
        .expect("the helper echoes");

    assert_eq!(answer.tokens(), ["start", "dc"]);

    channel.stop().await;

    Ok(())
}

#[tokio::test]
async fn concurrent_senders_each_get_their_own_answer() -> Result<()> {
    let helper = common::echo_helper("concurrent");

    let mut channel = ControlChannel::new(helper, "/dev/null");
    channel.start()?;

    let channel = Arc::new(channel);

    let mut tasks = Vec::new();
    for i in 0..10 {
        let channel = Arc::clone(&channel);

        tasks.push(tokio::spawn(async move {
            let command = format!("cmd-{i}");

            let answer = channel
                .send_command(&[command.as_str()])
                .await
                .unwrap()
                .expect("the helper echoes");

            // Sends are serialized, so nobody receives a neighbour's echo.
            assert_eq!(answer.to_string(), command);
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let mut channel = Arc::try_unwrap(channel).expect("all senders are done");
    channel.stop().await;

    Ok(())
}

#[tokio::test]
async fn late_answer_does_not_poison_the_next_send() -> Result<()> {
    // Answers the first command after two seconds, anything later immediately.
    let helper = common::helper_script(
        "slow",
        r#"read line
sleep 2
echo "$line" 1>&2
while read line; do echo "$line" 1>&2; done"#,
    );

    let mut channel = ControlChannel::new(helper, "/dev/null");
    channel.start()?;

    let started = Instant::now();
    let first = channel.send_command(&["first"]).await?;

    assert_eq!(first, None);
    assert!(started.elapsed() >= Duration::from_secs(1));

    // Let the answer to "first" arrive and sit in the slot, stale.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let second = channel
        .send_command(&["second"])
        .await?
        .expect("the helper echoes");

    assert_eq!(second.tokens(), ["second"]);

    channel.stop().await;

    Ok(())
}

#[tokio::test]
async fn error_lines_never_answer_commands() -> Result<()> {
    // Emits an out-of-band error line before every echo.
    let helper = common::helper_script(
        "noisy",
        r#"while read line; do echo "error noise" 1>&2; echo "$line" 1>&2; done"#,
    );

    let mut channel = ControlChannel::new(helper, "/dev/null");
    channel.start()?;

    let answer = channel
        .send_command(&["ping"])
        .await?
        .expect("the helper echoes");

    assert_eq!(answer.tokens(), ["ping"]);

    channel.stop().await;

    Ok(())
}

#[tokio::test]
async fn stop_is_idempotent() -> Result<()> {
    let helper = common::echo_helper("stop-twice");

    let mut channel = ControlChannel::new(helper, "/dev/null");
    channel.start()?;

    channel.stop().await;
    channel.stop().await;

    assert!(!channel.is_running());

    Ok(())
}

#[tokio::test]
async fn stop_without_start_is_a_noop() {
    let mut channel = ControlChannel::new("/does/not/matter", "/dev/null");

    channel.stop().await;
}

#[tokio::test]
async fn sending_without_starting_is_an_error() {
    let channel = ControlChannel::new("/does/not/matter", "/dev/null");

    let problem = channel.send_command(&["reset"]).await.unwrap_err();

    assert!(matches!(problem, Error::NotStarted));
}

#[tokio::test]
async fn unlaunchable_helper_is_an_error() {
    let mut channel = ControlChannel::new("/nonexistent/helper", "/dev/null");

    let problem = channel.start().unwrap_err();

    assert!(matches!(problem, Error::Launch { .. }));
}

#[tokio::test]
async fn writing_to_a_dead_helper_is_an_error() -> Result<()> {
    let helper = common::helper_script("dead", "exit 0");

    let mut channel = ControlChannel::new(helper, "/dev/null");
    channel.start()?;

    // Give the helper time to exit.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let problem = channel.send_command(&["anything"]).await.unwrap_err();

    assert!(matches!(problem, Error::Io(_)));

    channel.stop().await;

    Ok(())
}
