//! End-to-end tests: local client ⇄ relay process ⇄ fake chat server.

mod common;

use std::time::Duration;

use common::{FakeTwitch, TestRelay};

#[tokio::test]
async fn join_send_part_round_trip() {
    let twitch = FakeTwitch::start().await.expect("fake upstream");
    let relay = TestRelay::spawn(twitch.address()).await.expect("relay");
    let mut client = relay.connect().await.expect("client");

    client.send_raw("JOIN #somechannel").await.unwrap();
    assert_eq!(
        client.recv_line().await.unwrap(),
        ":relaybot!relaybot@relaybot.tmi.twitch.tv JOIN #somechannel"
    );
    twitch
        .expect_line("JOIN #somechannel", Duration::from_secs(2))
        .await
        .unwrap();

    client.send_raw("PRIVMSG #somechannel :hello").await.unwrap();
    twitch
        .expect_line("PRIVMSG #somechannel :hello", Duration::from_secs(3))
        .await
        .unwrap();

    client.send_raw("PART #somechannel").await.unwrap();
    assert_eq!(
        client.recv_line().await.unwrap(),
        ":relaybot!relaybot@relaybot.tmi.twitch.tv PART #somechannel"
    );
    twitch
        .expect_line("PART #somechannel", Duration::from_secs(2))
        .await
        .unwrap();

    let sends = twitch
        .received()
        .iter()
        .filter(|l| l.starts_with("PRIVMSG"))
        .count();
    assert_eq!(sends, 1);
}

#[tokio::test]
async fn greeting_and_ping() {
    let twitch = FakeTwitch::start().await.expect("fake upstream");
    let relay = TestRelay::spawn(twitch.address()).await.expect("relay");
    let mut client = relay.connect().await.expect("client");

    client.send_raw("CAP REQ :twitch.tv/tags").await.unwrap();
    let ack = client.recv().await.unwrap();
    assert_eq!(ack.command, "CAP");
    assert_eq!(ack.param(1), Some("ACK"));

    client.send_raw("NICK justinfan1").await.unwrap();
    let welcome = client.recv().await.unwrap();
    assert_eq!(welcome.command, "001");
    for _ in 0..6 {
        client.recv().await.unwrap();
    }

    client.send_raw("PING :abc").await.unwrap();
    assert_eq!(
        client.recv_line().await.unwrap(),
        ":tmi.twitch.tv PONG tmi.twitch.tv :abc"
    );
}

#[tokio::test]
async fn upstream_chat_is_broadcast() {
    let twitch = FakeTwitch::start().await.expect("fake upstream");
    let relay = TestRelay::spawn(twitch.address()).await.expect("relay");
    let mut first = relay.connect().await.expect("client");
    let mut second = relay.connect().await.expect("client");

    // a round trip guarantees both connections are registered
    for client in [&mut first, &mut second] {
        client.send_raw("PING :ready").await.unwrap();
        client.recv_line().await.unwrap();
    }

    let raw = "@badge-info=;badges=;display-name=Viewer;id=6f0a2d62-8b8b-4c33-9f1b-1f2e3d4c5b6a :viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #forsen :hi there";
    twitch.push(raw);

    assert_eq!(first.recv_line().await.unwrap(), raw);
    assert_eq!(second.recv_line().await.unwrap(), raw);
}

#[tokio::test]
async fn repeated_text_carries_marker() {
    let twitch = FakeTwitch::start().await.expect("fake upstream");
    let relay = TestRelay::spawn(twitch.address()).await.expect("relay");
    let mut client = relay.connect().await.expect("client");

    client.send_raw("JOIN #forsen").await.unwrap();
    client.recv_line().await.unwrap();
    twitch.push("@badges=moderator/1;mod=1 :tmi.twitch.tv USERSTATE #forsen");
    // USERSTATE is forwarded to clients too
    client.recv_line().await.unwrap();

    client.send_raw("PRIVMSG #forsen :gg").await.unwrap();
    client.send_raw("PRIVMSG #forsen :gg").await.unwrap();

    twitch
        .expect_line("PRIVMSG #forsen :gg", Duration::from_secs(3))
        .await
        .unwrap();
    twitch
        .expect_line("PRIVMSG #forsen :gg\u{E0000}", Duration::from_secs(3))
        .await
        .unwrap();
}
