//! Voice catalog tests against a wiremock HTTP server

use std::sync::Arc;

use readaloud_client::core::tts::edge::voices::builtin_voices;
use readaloud_client::core::tts::edge::{Clock, ClockSkew, EdgeTTSConfig, TungsteniteTransport};
use readaloud_client::core::tts::{EdgeTTS, SpeechSynthesizer, TTSError};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 2023-11-14T22:13:20Z
const LOCAL_NOW: f64 = 1_700_000_000.0;
/// LOCAL_NOW + 60 s
const SERVER_DATE: &str = "Tue, 14 Nov 2023 22:14:20 GMT";

struct PinnedClock(f64);

impl Clock for PinnedClock {
    fn now_epoch_seconds(&self) -> f64 {
        self.0
    }
}

fn init_crypto() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn client_for(server: &MockServer) -> (EdgeTTS, Arc<ClockSkew>) {
    init_crypto();
    let skew = Arc::new(ClockSkew::new(Arc::new(PinnedClock(LOCAL_NOW))));
    let config = EdgeTTSConfig::default()
        .with_voice_list_url(format!("{}/voices/list", server.uri()));
    let tts = EdgeTTS::with_parts(config, Arc::new(TungsteniteTransport), skew.clone()).unwrap();
    (tts, skew)
}

fn catalog_body() -> serde_json::Value {
    json!([
        {
            "Name": "Microsoft Server Speech Text to Speech Voice (en-US, AriaNeural)",
            "ShortName": "en-US-AriaNeural",
            "Gender": "Female",
            "Locale": "en-US",
            "FriendlyName": "Microsoft Aria Online (Natural) - English (United States)",
            "Status": "GA"
        },
        {
            "ShortName": "fr-FR-DeniseNeural",
            "Gender": "Female",
            "Locale": "fr-FR",
            "FriendlyName": "Microsoft Denise Online (Natural) - French (France)"
        }
    ])
}

#[tokio::test]
async fn test_fetch_voices_sends_credentials() {
    let server = MockServer::start().await;
    let (tts, _) = client_for(&server);

    Mock::given(method("GET"))
        .and(path("/voices/list"))
        .and(query_param(
            "trustedclienttoken",
            tts.config().trusted_client_token.as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body()))
        .expect(1)
        .mount(&server)
        .await;

    let voices = tts.voice_catalog().fetch_voices().await.unwrap();
    assert_eq!(voices.len(), 2);
    assert_eq!(voices[0].short_name, "en-US-AriaNeural");
    assert_eq!(voices[1].locale, "fr-FR");

    let requests = server.received_requests().await.unwrap();
    let query: Vec<String> = requests[0]
        .url
        .query_pairs()
        .map(|(k, _)| k.into_owned())
        .collect();
    assert_eq!(query, ["trustedclienttoken", "Sec-MS-GEC", "Sec-MS-GEC-Version"]);
}

#[tokio::test]
async fn test_date_header_adjusts_skew() {
    let server = MockServer::start().await;
    let (tts, skew) = client_for(&server);

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Date", SERVER_DATE)
                .set_body_json(catalog_body()),
        )
        .mount(&server)
        .await;

    assert_eq!(skew.skew_seconds(), 0.0);
    tts.voice_catalog().fetch_voices().await.unwrap();
    assert_eq!(skew.skew_seconds(), 60.0);
    assert_eq!(skew.current_adjusted_epoch_seconds(), LOCAL_NOW + 60.0);
}

#[tokio::test]
async fn test_date_header_observed_on_error_status() {
    let server = MockServer::start().await;
    let (tts, skew) = client_for(&server);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).insert_header("Date", SERVER_DATE))
        .mount(&server)
        .await;

    let err = tts.voice_catalog().fetch_voices().await.unwrap_err();
    assert!(matches!(err, TTSError::ProviderError(ref msg) if msg.contains("403")));
    assert_eq!(skew.skew_seconds(), 60.0);
}

#[tokio::test]
async fn test_empty_catalog_falls_back_to_builtins() {
    let server = MockServer::start().await;
    let (tts, _) = client_for(&server);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert_eq!(tts.voice_catalog().list_voices().await, builtin_voices());
}

#[tokio::test]
async fn test_failing_catalog_falls_back_to_builtins() {
    let server = MockServer::start().await;
    let (tts, _) = client_for(&server);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let voices = tts.list_voices().await;
    assert_eq!(voices, builtin_voices());
}

#[tokio::test]
async fn test_malformed_catalog_falls_back_to_builtins() {
    let server = MockServer::start().await;
    let (tts, _) = client_for(&server);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    assert!(tts.voice_catalog().fetch_voices().await.is_err());
    assert_eq!(tts.voice_catalog().list_voices().await.len(), 7);
}
