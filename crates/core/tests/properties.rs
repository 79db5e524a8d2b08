//! Property tests for like diffing, token filtering and chunked sending.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;

use barrio_common::Metrics;
use barrio_common::config::PushConfig;
use barrio_core::test_utils::{InMemoryDirectory, RecordingGateway};
use barrio_core::{
    Locale, MessageBuilder, PushDispatcher, PushMessage, RecipientResolver, Resolution,
    is_valid_push_token, new_likers,
};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn liker_ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-h]", 0..16)
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(future)
}

fn messages(n: usize) -> Vec<PushMessage> {
    let builder = MessageBuilder::default();
    (0..n)
        .map(|i| builder.post_liked(&format!("ExpoPushToken[{i}]"), Locale::En, None, "p1"))
        .collect()
}

proptest! {
    #![proptest_config(Config::with_cases(128))]

    #[test]
    fn new_likers_is_the_set_difference(before in liker_ids(), after in liker_ids()) {
        let result = new_likers(&before, &after);

        let before_set: HashSet<&str> = before.iter().map(String::as_str).collect();
        let expected: HashSet<&str> = after
            .iter()
            .map(String::as_str)
            .filter(|id| !before_set.contains(id))
            .collect();
        let got: HashSet<&str> = result.iter().copied().collect();

        prop_assert_eq!(result.len(), got.len());
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn new_likers_ignores_before_order(before in liker_ids(), after in liker_ids()) {
        let mut reversed = before.clone();
        reversed.reverse();
        let mut sorted = before.clone();
        sorted.sort();

        let expected = new_likers(&before, &after);
        prop_assert_eq!(new_likers(&reversed, &after), expected.clone());
        prop_assert_eq!(new_likers(&sorted, &after), expected);
    }

    #[test]
    fn only_valid_tokens_are_resolved(
        tokens in prop::collection::vec(
            prop_oneof![
                "ExpoPushToken\\[[a-zA-Z0-9]{1,12}\\]",
                "ExponentPushToken\\[[a-zA-Z0-9]{1,12}\\]",
                "[a-z0-9:\\[\\] -]{0,20}",
            ],
            0..20,
        )
    ) {
        let mut directory = InMemoryDirectory::default();
        for (i, token) in tokens.iter().enumerate() {
            directory = directory.with_user(&format!("u{i}"), None, Some(token.as_str()), None, Some("Lima"));
        }
        let resolver =
            RecipientResolver::new(Arc::new(directory), MessageBuilder::default(), Locale::Es);

        let resolution = block_on(resolver.for_new_post("Lima", "author", None, "p1")).unwrap();

        let valid = tokens.iter().filter(|t| is_valid_push_token(t)).count();
        prop_assert!(resolution.messages.iter().all(|m| is_valid_push_token(&m.to)));
        prop_assert_eq!(resolution.messages.len(), valid);
        prop_assert_eq!(resolution.skipped, tokens.len() - valid);
    }
}

proptest! {
    #![proptest_config(Config::with_cases(48))]

    #[test]
    fn chunks_reconstruct_the_input(n in 0_usize..320, batch in 1_usize..=100) {
        let gateway = Arc::new(RecordingGateway::default());
        let config = PushConfig {
            send_batch_size: batch,
            ..PushConfig::default()
        };
        let dispatcher = PushDispatcher::new(gateway.clone(), &config, Arc::new(Metrics::new()));
        let input = messages(n);

        let report = block_on(dispatcher.dispatch(Resolution {
            messages: input.clone(),
            skipped: 0,
        }));

        let calls = gateway.send_calls();
        prop_assert_eq!(calls.len(), n.div_ceil(batch));
        prop_assert!(calls.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= batch));
        prop_assert_eq!(calls.concat(), input);
        prop_assert_eq!(report.tickets_ok, n);
    }
}
