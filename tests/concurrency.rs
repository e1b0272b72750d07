//! Admission control under more clients than slots.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hitch::http::{HandlerError, Request, ResponderChain, Response};
use hitch::routing::{Params, Router};

mod common;

const SLOTS: usize = 2;
const CLIENTS: usize = 5;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lifecycles_never_exceed_slots() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let router = {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        Router::new().get("/slow", move |_request: Request, _params: Params| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(150)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, HandlerError>(Response::new().with_body("done"))
            }
        })
    };

    let server = common::start_server(ResponderChain::new().with(router), |config| {
        config.listener.max_connections = SLOTS;
    })
    .await;

    let client = reqwest::Client::new();
    let requests: Vec<_> = (0..CLIENTS)
        .map(|_| {
            let client = client.clone();
            let url = server.url("/slow");
            tokio::spawn(async move { client.get(url).send().await?.text().await })
        })
        .collect();

    for request in requests {
        let body = tokio::time::timeout(Duration::from_secs(10), request)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(body, "done");
    }

    assert!(peak.load(Ordering::SeqCst) <= SLOTS);
    assert!(server.server().tracker().peak_count() as usize <= SLOTS);
    tokio::time::timeout(Duration::from_secs(2), server.server().tracker().wait_idle())
        .await
        .unwrap();

    server.stop().await;
}
