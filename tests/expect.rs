use std::time::Duration;

use color_eyre::Result;
use pretty_assertions::assert_eq;
use serial_expect::scanner::Scanner;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn boot_banner_dialogue() -> Result<()> {
    let (ours, mut firmware) = duplex(256);

    tokio::spawn(async move {
        firmware.write_all(b"booting...\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        firmware.write_all(b"node v1.4 ready\n").await.unwrap();

        // Stay interactive: answer the echo command.
        let mut command = [0u8; 5];
        firmware.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, b"echo\n");
        firmware.write_all(b"echo: hello\n").await.unwrap();

        // Keep the console open while the scanner works.
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let mut scanner = Scanner::new(ours);

    let banner = scanner
        .expect(r"node v(\d+)\.(\d+) ready", Some(Duration::from_secs(2)))
        .await?
        .expect("the banner appears");

    assert_eq!(banner, "node v1.4 ready");

    scanner.send_line("echo").await?;

    let echoed = scanner
        .expect("hello", Some(Duration::from_secs(2)))
        .await?
        .expect("the echo appears");

    assert_eq!(echoed, "hello");

    Ok(())
}

#[tokio::test]
async fn alternatives_require_retesting() -> Result<()> {
    let (ours, mut firmware) = duplex(256);

    tokio::spawn(async move {
        firmware.write_all(b"status: FAILED\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let mut scanner = Scanner::new(ours);

    let outcome = scanner
        .expect_list(&["PASSED", "FAILED"], Some(Duration::from_secs(2)))
        .await?
        .expect("one alternative fires");

    // The combined scan does not say which branch fired;
    // the caller re-tests the substring.
    assert_eq!(outcome, "FAILED");

    Ok(())
}
