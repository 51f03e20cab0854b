//! A scripted walkthrough of the lobby protocol: boots a server, then
//! plays both sides of a two-player study session over real WebSockets.
//!
//! Run with `cargo run -p lobby-party`; set `RUST_LOG=debug` to watch
//! the server side of the conversation.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use quizroom::prelude::*;
use tokio_tungstenite::tungstenite::Message;

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(addr: &str) -> Ws {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("client should connect");
    ws
}

async fn send(ws: &mut Ws, request: &Request) {
    let text = serde_json::to_string(request).expect("encode request");
    ws.send(Message::Text(text.into())).await.expect("send request");
}

async fn next_frame(ws: &mut Ws) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("frame error");
    serde_json::from_slice(&msg.into_data()).expect("frame should be JSON")
}

/// Reads frames until the response to the last request shows up,
/// narrating any broadcast events that arrive in between.
async fn response(who: &str, ws: &mut Ws) -> serde_json::Value {
    loop {
        let frame = next_frame(ws).await;
        if frame.get("result").is_some() {
            return frame;
        }
        narrate(who, &frame);
    }
}

/// Reads frames until the named event shows up, narrating everything.
async fn event(who: &str, ws: &mut Ws, name: &str) -> serde_json::Value {
    loop {
        let frame = next_frame(ws).await;
        narrate(who, &frame);
        if frame["event"] == name {
            return frame;
        }
    }
}

fn narrate(who: &str, frame: &serde_json::Value) {
    match frame["event"].as_str() {
        Some("playerJoined") => {
            println!("  [{who}] sees {} join", frame["data"]["player"]["name"]);
        }
        Some("playerLeft") => {
            let room = &frame["data"]["room"];
            println!(
                "  [{who}] sees a player leave; host is now {}",
                room["players"][0]["name"]
            );
        }
        Some("gameStarted") => println!("  [{who}] sees the game start"),
        Some("playerAction") => {
            let data = &frame["data"];
            println!(
                "  [{who}] sees {} do {}",
                data["playerName"], data["actionName"]
            );
        }
        Some("roomUpdated") => {} // catch-all signal, quiet in the demo
        _ => println!("  [{who}] got {frame}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), QuizroomError> {
    quizroom::init_tracing();

    let server = QuizroomServerBuilder::new()
        .bind("127.0.0.1:0")
        .idle_room_timeout(Duration::from_secs(1800))
        .build()
        .await?;
    let addr = server.local_addr().expect("local addr").to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    println!("server listening on {addr}");

    // Alice opens a room for her vocabulary deck.
    let mut alice = connect(&addr).await;
    send(
        &mut alice,
        &Request::CreateRoom {
            deck_ref: "spanish-vocab-101".into(),
            host_name: "Alice".into(),
        },
    )
    .await;
    let resp = response("alice", &mut alice).await;
    let code = resp["data"]["roomCode"].as_str().expect("code").to_string();
    println!("alice opened room {code}");

    // Bob joins with the code Alice shared (case doesn't matter).
    let mut bob = connect(&addr).await;
    send(
        &mut bob,
        &Request::JoinRoom {
            room_code: code.to_lowercase(),
            player_name: "Bob".into(),
        },
    )
    .await;
    let resp = response("bob", &mut bob).await;
    println!(
        "bob joined; lobby has {} players",
        resp["data"]["room"]["players"].as_array().map_or(0, Vec::len)
    );
    event("alice", &mut alice, "playerJoined").await;

    // Bob tries to jump the gun.
    send(&mut bob, &Request::StartGame).await;
    let resp = response("bob", &mut bob).await;
    println!("bob tries to start: {} ({})", resp["result"], resp["data"]["code"]);

    // Alice actually starts.
    send(&mut alice, &Request::StartGame).await;
    response("alice", &mut alice).await;
    event("bob", &mut bob, "gameStarted").await;

    // Bob flips a card; everyone sees it, Bob included.
    send(
        &mut bob,
        &Request::SendAction {
            action_name: "cardFlipped".into(),
            payload: serde_json::json!({"cardIndex": 3}),
        },
    )
    .await;
    response("bob", &mut bob).await;
    event("alice", &mut alice, "playerAction").await;
    event("bob", &mut bob, "playerAction").await;

    // Alice leaves; Bob inherits the host seat.
    send(&mut alice, &Request::LeaveRoom).await;
    response("alice", &mut alice).await;
    event("bob", &mut bob, "playerLeft").await;

    // Bob leaves too; the room dissolves.
    send(&mut bob, &Request::LeaveRoom).await;
    response("bob", &mut bob).await;
    println!("everyone left; room {code} is gone");

    Ok(())
}
