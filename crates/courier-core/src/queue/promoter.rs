//! Promoter - delay set から ready list への移送
//!
//! # 状態遷移
//! ```text
//! Idle-Wait ──(score <= now)──► Promoting ──(次の entry も期限切れ)──► Promoting
//!     ▲                              │
//!     └──────(空 / score > now)──────┘
//! ```
//!
//! Waiting never sleeps longer than `empty_rest_interval`, so an entry
//! inserted with an earlier score is picked up within one rest interval.

use std::convert::Infallible;
use std::time::Duration;

use super::Queue;
use crate::domain::{DelayedMember, Message, Topic};
use crate::error::QueueError;

/// Outcome of one promoter iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum PromoteStep {
    /// Delay set is empty.
    Idle,
    /// Head entry is not due yet; sleep this long before looking again.
    Waiting(Duration),
    /// Head entry was moved to the ready list.
    Promoted(Message),
    /// Head entry was already removed by someone else; nothing published.
    Skipped,
}

impl Queue {
    pub async fn promote_once(&self, topic: &Topic) -> Result<PromoteStep, QueueError> {
        let delay_key = self.delay_key(topic);
        let store = self.store();

        let head = store.sorted_set_range_with_scores(&delay_key, 0, 0).await?;
        let Some((member, score)) = head.into_iter().next() else {
            return Ok(PromoteStep::Idle);
        };

        let now = self.inner.clock.now().timestamp_millis() as f64 / 1000.0;
        if score > now {
            let rest = self.config().empty_rest_interval();
            // +inf や桁外れの score は rest で頭打ち
            let pause =
                Duration::try_from_secs_f64(score - now).map_or(rest, |left| left.min(rest));
            return Ok(PromoteStep::Waiting(pause));
        }

        if store.sorted_set_remove(&delay_key, &member).await? == 0 {
            return Ok(PromoteStep::Skipped);
        }

        let message = if self.config().tag_delayed_members {
            DelayedMember::decode(&member).into_message()
        } else {
            Message::text(member.as_str())
        };
        if let Err(err) = self.publish(topic, message.clone()).await {
            // 取り出し済みの entry を戻しておく（失敗しても元のエラーを返す）
            if let Err(reinsert) = store.sorted_set_insert(&delay_key, &member, score).await {
                tracing::error!(
                    %topic,
                    message = %message,
                    error = %reinsert,
                    "failed to restore delayed entry"
                );
            }
            return Err(err);
        }

        Ok(PromoteStep::Promoted(message))
    }

    pub(crate) async fn run_promoter(&self, topic: &Topic) -> Result<Infallible, QueueError> {
        loop {
            match self.promote_once(topic).await? {
                PromoteStep::Idle => {
                    tokio::time::sleep(self.config().empty_rest_interval()).await;
                }
                PromoteStep::Waiting(pause) => tokio::time::sleep(pause).await,
                PromoteStep::Promoted(message) => {
                    tracing::debug!(%topic, %message, "promoted delayed message");
                    tokio::task::yield_now().await;
                }
                PromoteStep::Skipped => tokio::task::yield_now().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::ports::Store;
    use crate::queue::tests::{fixture, scripted_fixture, t0};
    use chrono::Duration as ChronoDuration;
    use rstest::rstest;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn empty_delay_set_is_idle() {
        let (queue, _, _) = fixture(QueueConfig::default());
        let step = queue.promote_once(&Topic::new("orders")).await.unwrap();
        assert_eq!(step, PromoteStep::Idle);
    }

    #[tokio::test]
    async fn delayed_message_becomes_ready_after_its_delay() {
        let (queue, store, clock) = fixture(QueueConfig::default());
        let topic = Topic::new("orders");
        queue.publish_delayed(&topic, r#"{"id":2}"#, 5).await.unwrap();

        clock.advance(ChronoDuration::seconds(1));
        let step = queue.promote_once(&topic).await.unwrap();
        assert!(matches!(step, PromoteStep::Waiting(_)));
        assert_eq!(store.sorted_set_len("orders.queue.delay").await.unwrap(), 1);
        assert_eq!(store.list_len("orders.queue").await.unwrap(), 0);

        clock.advance(ChronoDuration::seconds(5));
        let step = queue.promote_once(&topic).await.unwrap();
        assert_eq!(step, PromoteStep::Promoted(Message::text(r#"{"id":2}"#)));
        assert_eq!(store.sorted_set_len("orders.queue.delay").await.unwrap(), 0);
        assert_eq!(
            store.list_snapshot("orders.queue").await,
            vec![r#"{"id":2}"#.to_string()]
        );
    }

    #[rstest]
    #[case::far_future(60, Duration::from_secs(2))]
    #[case::almost_due(1, Duration::from_secs(1))]
    #[tokio::test]
    async fn waiting_is_clamped_to_rest_interval(#[case] delay: u64, #[case] expected: Duration) {
        let (queue, _, _) = fixture(QueueConfig::default());
        let topic = Topic::new("orders");
        queue.publish_delayed(&topic, "later", delay).await.unwrap();

        let step = queue.promote_once(&topic).await.unwrap();
        assert_eq!(step, PromoteStep::Waiting(expected));
    }

    #[tokio::test]
    async fn promotion_follows_score_order() {
        let (queue, store, clock) = fixture(QueueConfig::default());
        let topic = Topic::new("orders");
        queue.publish_delayed(&topic, "second", 20).await.unwrap();
        queue.publish_delayed(&topic, "first", 10).await.unwrap();
        queue.publish_delayed(&topic, "third", 30).await.unwrap();

        clock.advance(ChronoDuration::seconds(30));
        for _ in 0..3 {
            assert!(matches!(
                queue.promote_once(&topic).await.unwrap(),
                PromoteStep::Promoted(_)
            ));
        }
        assert_eq!(queue.promote_once(&topic).await.unwrap(), PromoteStep::Idle);
        assert_eq!(
            store.list_snapshot("orders.queue").await,
            vec!["first".to_string(), "second".to_string(), "third".to_string()]
        );
    }

    #[tokio::test]
    async fn untagged_members_from_other_producers_are_promoted_verbatim() {
        let (queue, store, _) = fixture(QueueConfig::default());
        let topic = Topic::new("orders");
        store
            .sorted_set_insert("orders.queue.delay", r#"{"id":3}"#, t0().timestamp() as f64)
            .await
            .unwrap();

        let step = queue.promote_once(&topic).await.unwrap();
        assert_eq!(step, PromoteStep::Promoted(Message::text(r#"{"id":3}"#)));
    }

    #[rstest]
    #[case::tagging_off(false)]
    #[case::tagging_on(true)]
    #[tokio::test]
    async fn ulid_looking_payload_is_not_rewritten(#[case] tag_delayed_members: bool) {
        let (queue, store, _) = fixture(QueueConfig {
            tag_delayed_members,
            ..QueueConfig::default()
        });
        let topic = Topic::new("orders");
        let payload = "01ARZ3NDEKTSV4RRFFQ69G5FAV:order-42";
        queue.publish_delayed(&topic, payload, 0).await.unwrap();

        let step = queue.promote_once(&topic).await.unwrap();
        assert_eq!(step, PromoteStep::Promoted(Message::text(payload)));
        assert_eq!(
            store.list_snapshot("orders.queue").await,
            vec![payload.to_string()]
        );
    }

    #[tokio::test]
    async fn tagged_leftovers_pass_through_when_tagging_is_off() {
        let (queue, store, _) = fixture(QueueConfig {
            tag_delayed_members: false,
            ..QueueConfig::default()
        });
        let member = format!("{}01ARZ3NDEKTSV4RRFFQ69G5FAV:x", crate::domain::TAG_MARKER);
        store
            .sorted_set_insert("orders.queue.delay", &member, t0().timestamp() as f64)
            .await
            .unwrap();

        let step = queue.promote_once(&Topic::new("orders")).await.unwrap();
        assert_eq!(step, PromoteStep::Promoted(Message::text(member)));
    }

    #[rstest]
    #[case::infinite(f64::INFINITY)]
    #[case::beyond_duration_range(1.0e20)]
    #[tokio::test]
    async fn unreachable_score_waits_one_rest_interval(#[case] score: f64) {
        let (queue, store, _) = fixture(QueueConfig::default());
        store
            .sorted_set_insert("orders.queue.delay", "never", score)
            .await
            .unwrap();

        let step = queue.promote_once(&Topic::new("orders")).await.unwrap();
        assert_eq!(step, PromoteStep::Waiting(Duration::from_secs(2)));
        assert_eq!(store.sorted_set_len("orders.queue.delay").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn entry_removed_by_another_promoter_is_skipped() {
        let (queue, store) = scripted_fixture(QueueConfig::default());
        let due = t0().timestamp() as f64;
        *store.stale_head.lock().unwrap() = Some(("taken".to_string(), due));

        let step = queue.promote_once(&Topic::new("orders")).await.unwrap();
        assert_eq!(step, PromoteStep::Skipped);
        assert_eq!(store.list_len("orders.queue").await.unwrap(), 0);
        assert_eq!(store.sorted_set_len("orders.queue.delay").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_publish_puts_the_entry_back() {
        let (queue, store) = scripted_fixture(QueueConfig {
            tag_delayed_members: false,
            ..QueueConfig::default()
        });
        let topic = Topic::new("orders");
        queue.publish_delayed(&topic, r#"{"id":9}"#, 0).await.unwrap();
        let before = store.inner.sorted_set_snapshot("orders.queue.delay").await;

        store.fail_push.store(true, Ordering::SeqCst);
        let result = queue.promote_once(&topic).await;
        assert!(matches!(result, Err(QueueError::Store(_))));
        assert_eq!(
            store.inner.sorted_set_snapshot("orders.queue.delay").await,
            before
        );
        assert_eq!(store.list_len("orders.queue").await.unwrap(), 0);

        store.fail_push.store(false, Ordering::SeqCst);
        assert_eq!(
            queue.promote_once(&topic).await.unwrap(),
            PromoteStep::Promoted(Message::text(r#"{"id":9}"#))
        );
    }

    #[tokio::test]
    async fn store_failure_is_returned() {
        let (queue, store, _) = fixture(QueueConfig::default());
        store.close().await;
        let result = queue.promote_once(&Topic::new("orders")).await;
        assert!(matches!(result, Err(QueueError::Store(_))));
    }
}
