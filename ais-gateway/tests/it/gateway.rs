use std::time::Duration;

use futures::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpStream,
    time::timeout,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::helper::{SpawnOptions, spawn_app, spawn_app_with, test_cloud_vessels, test_vessel};

fn checksum_is_valid(sentence: &str) -> bool {
    let Some((body, cs)) = sentence.split_once('*') else {
        return false;
    };
    let expected = body.bytes().skip(1).fold(0u8, |acc, b| acc ^ b);
    cs.trim() == format!("{expected:02X}")
}

#[tokio::test]
async fn tcp_client_receives_aivdm_sentences() {
    let vessels = serde_json::json!({
        "urn:mrn:imo:mmsi:244813000": test_vessel("TESTSHIP", "PD1234"),
    });
    let helper = spawn_app(vessels, false).await;

    let stream = TcpStream::connect(helper.tcp_addr).await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .unwrap()
        .unwrap();

    assert!(line.starts_with("!AIVDM,"), "{line}");
    assert!(line.ends_with("\r\n"));
    assert!(checksum_is_valid(line.trim_end()));
}

#[tokio::test]
async fn vessel_with_callsign_also_gets_a_two_fragment_type_5() {
    let vessels = serde_json::json!({
        "urn:mrn:imo:mmsi:244813000": test_vessel("TESTSHIP", "PD1234"),
    });
    let helper = spawn_app(vessels, false).await;

    let stream = TcpStream::connect(helper.tcp_addr).await.unwrap();
    let mut reader = BufReader::new(stream);

    let mut lines = Vec::new();
    for _ in 0..3 {
        let mut line = String::new();
        timeout(Duration::from_secs(5), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        lines.push(line.trim_end().to_string());
    }

    // Position report first, then the split static-and-voyage message. All
    // three sentences of the cycle carry the same sequential message id.
    let first: Vec<&str> = lines[0].split(',').collect();
    assert_eq!((first[0], first[1], first[2], first[4]), ("!AIVDM", "1", "1", "B"));
    let msg_id = first[3];
    assert!(
        msg_id.len() == 1 && msg_id.chars().all(|c| c.is_ascii_digit()),
        "{}",
        lines[0]
    );
    assert!(lines[1].contains(&format!(",2,1,{msg_id},")), "{}", lines[1]);
    assert!(lines[2].contains(&format!(",2,2,{msg_id},")), "{}", lines[2]);
    for line in &lines {
        assert!(checksum_is_valid(line), "{line}");
    }
}

#[tokio::test]
async fn debug_mmsi_does_not_narrow_the_broadcast_output() {
    let vessels = serde_json::json!({
        "urn:mrn:imo:mmsi:244813000": test_vessel("TESTSHIP", "PD1234"),
        "urn:mrn:imo:mmsi:244814000": test_vessel("OTHERSHIP", "PD5678"),
    });
    let helper = spawn_app_with(
        vessels,
        SpawnOptions {
            debug_mmsi: Some(244_813_000),
            ..Default::default()
        },
    )
    .await;

    let stream = TcpStream::connect(helper.tcp_addr).await.unwrap();
    let mut reader = BufReader::new(stream);

    let mut seen = std::collections::HashSet::new();
    for _ in 0..9 {
        let mut line = String::new();
        let Ok(read) = timeout(Duration::from_secs(2), reader.read_line(&mut line)).await else {
            break;
        };
        read.unwrap();
        let payload = line.split(',').nth(5).unwrap();
        seen.insert(armored_mmsi(payload));
        if seen.len() == 2 {
            break;
        }
    }
    assert!(seen.contains(&244_813_000), "{seen:?}");
    assert!(seen.contains(&244_814_000), "{seen:?}");
}

#[tokio::test]
async fn cloud_vessels_survive_a_primary_source_outage() {
    let helper = spawn_app_with(
        serde_json::json!({}),
        SpawnOptions {
            primary_failures: u64::MAX,
            cloud_vessels: Some(test_cloud_vessels()),
            ..Default::default()
        },
    )
    .await;

    let stream = TcpStream::connect(helper.tcp_addr).await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .unwrap()
        .unwrap();

    let payload = line.split(',').nth(5).unwrap();
    assert_eq!(armored_mmsi(payload), 244_815_000, "{line}");
}

#[tokio::test]
async fn shutdown_closes_the_listening_socket() {
    let vessels = serde_json::json!({
        "urn:mrn:imo:mmsi:244813000": test_vessel("TESTSHIP", "PD1234"),
    });
    let helper = spawn_app(vessels, false).await;

    let stream = TcpStream::connect(helper.tcp_addr).await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .unwrap()
        .unwrap();

    helper.shutdown.send(()).unwrap();

    let mut refused = false;
    for _ in 0..50 {
        if TcpStream::connect(helper.tcp_addr).await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(refused, "listener still accepting after shutdown");
}

#[tokio::test]
async fn invalid_mmsi_vessels_are_never_broadcast() {
    let vessels = serde_json::json!({
        "urn:mrn:imo:mmsi:1234": test_vessel("SHORTY", "XX1"),
        "urn:mrn:imo:mmsi:244813000": test_vessel("TESTSHIP", "PD1234"),
    });
    let helper = spawn_app(vessels, false).await;

    let stream = TcpStream::connect(helper.tcp_addr).await.unwrap();
    let mut reader = BufReader::new(stream);

    // 244813000 sends three sentences per cycle; SHORTY would add more.
    // Collect one full cycle's worth and check the armored MMSI never
    // belongs to the short one.
    let mut lines = Vec::new();
    for _ in 0..3 {
        let mut line = String::new();
        timeout(Duration::from_secs(5), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        lines.push(line);
    }
    for line in &lines {
        let payload = line.split(',').nth(5).unwrap();
        let mmsi = armored_mmsi(payload);
        assert_eq!(mmsi, 244_813_000, "{line}");
    }
}

#[tokio::test]
async fn websocket_client_gets_sentences_and_json_records() {
    let vessels = serde_json::json!({
        "urn:mrn:imo:mmsi:244813000": test_vessel("TESTSHIP", "PD1234"),
    });
    let helper = spawn_app(vessels, true).await;
    let ws_addr = helper.ws_addr.expect("websocket listener enabled");

    let (mut ws, _) = connect_async(format!("ws://{ws_addr}/"))
        .await
        .unwrap();

    let mut saw_sentence = false;
    let mut saw_record = false;
    for _ in 0..8 {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = message {
            if text.starts_with("!AIVDM,") {
                saw_sentence = true;
            } else if let Ok(record) = serde_json::from_str::<serde_json::Value>(&text) {
                saw_record |= record.get("mmsi").is_some();
            }
        }
        if saw_sentence && saw_record {
            break;
        }
    }
    assert!(saw_sentence);
    assert!(saw_record);
}

/// Decodes the 30-bit MMSI field starting at bit 8 of an armored payload.
fn armored_mmsi(payload: &str) -> u64 {
    let bits: Vec<u8> = payload
        .bytes()
        .map(|b| if b >= 96 { b - 56 } else { b - 48 })
        .collect();
    let mut mmsi = 0u64;
    for i in 8..38 {
        let bit = bits[i / 6] >> (5 - i % 6) & 1;
        mmsi = mmsi << 1 | u64::from(bit);
    }
    mmsi
}
