//! AFK / disconnect auto-resign timer engine, §4.5. The teacher has no
//! equivalent (`pacosako` games don't auto-resign on idleness), so this is
//! new logic, grounded on the *shape* of `ws/timeout_connector.rs`'s
//! generic `Timeout<T>` (typed key, earliest-wins scheduling) — reworked
//! here on top of `Scheduler` since that already gives first-class
//! schedule/cancel handles instead of a standalone thread.

use crate::domain::{Color, MatchInfo};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::transport::messages::OutboundGameMessage;
use crate::transport::send_to_opponent;
use chrono::{DateTime, Duration, Utc};

pub struct TimerEngineConfig {
    pub disconnect_forgiveness: Duration,
    pub auto_resign_by_choice: Duration,
    pub auto_resign_not_by_choice: Duration,
    pub afk_auto_resign: Duration,
}

impl Default for TimerEngineConfig {
    fn default() -> Self {
        TimerEngineConfig {
            disconnect_forgiveness: Duration::seconds(5),
            auto_resign_by_choice: Duration::seconds(20),
            auto_resign_not_by_choice: Duration::seconds(60),
            afk_auto_resign: Duration::seconds(20),
        }
    }
}

pub struct TimerEngine {
    scheduler: Scheduler,
    config: TimerEngineConfig,
}

impl TimerEngine {
    pub fn new(scheduler: Scheduler, config: TimerEngineConfig) -> TimerEngine {
        TimerEngine { scheduler, config }
    }

    /// §4.5 step 1: a socket closed unexpectedly and the game isn't over.
    /// When `not_by_choice`, a 5s cushion runs first; `arm_real_timer` is
    /// the caller-supplied continuation that re-acquires this game's lock
    /// and calls `start_disconnect_timer` for real once the cushion
    /// fires (§5 "timers ... must re-enter the per-game critical section
    /// on wake" — this engine cannot hold `&mut MatchInfo` across the
    /// scheduler's sleep, so the re-entry is the caller's job).
    pub fn on_unexpected_close<F, G>(
        &self,
        info: &mut MatchInfo,
        color: Color,
        not_by_choice: bool,
        resignable: bool,
        whos_turn: Option<Color>,
        now: DateTime<Utc>,
        arm_real_timer: F,
        on_resign: G,
    ) where
        F: FnOnce() + Send + 'static,
        G: FnOnce() + Send + 'static,
    {
        if not_by_choice {
            let cushion_fire_at = now + self.config.disconnect_forgiveness;
            let start_id = self.scheduler.schedule(cushion_fire_at, arm_real_timer);
            info.player_mut(color).disconnect.start_id = Some(start_id);
        } else {
            self.start_disconnect_timer(info, color, false, resignable, whos_turn, now, on_resign);
        }
    }

    /// §4.5 step 2. If `color`'s turn and an AFK timer is running, the
    /// disconnect timer *inherits* that deadline rather than extending
    /// it — the adoption lemma from §8.
    pub fn start_disconnect_timer<F>(
        &self,
        info: &mut MatchInfo,
        color: Color,
        not_by_choice: bool,
        resignable: bool,
        whos_turn: Option<Color>,
        now: DateTime<Utc>,
        on_resign: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        let inherited_afk_deadline = if whos_turn == Some(color) {
            info.auto_afk_resign_time
        } else {
            None
        };

        let (fire_at, was_by_choice) = match inherited_afk_deadline {
            Some(afk_deadline) => {
                self.cancel_auto_afk_resign_timer(info, false, color);
                (afk_deadline.min(now + self.resign_duration(not_by_choice, resignable)), !not_by_choice)
            }
            None => (now + self.resign_duration(not_by_choice, resignable), !not_by_choice),
        };

        let opponent = color.invert();
        let timeout_id = self.scheduler.schedule(fire_at, move || on_resign());

        let disconnect = &mut info.player_mut(color).disconnect;
        disconnect.timeout_id = Some(timeout_id);
        disconnect.time_to_auto_loss = Some(fire_at);
        disconnect.was_by_choice = Some(was_by_choice);

        let millis_until = (fire_at - now).num_milliseconds().max(0);
        send_to_opponent(
            info,
            color,
            &OutboundGameMessage::OpponentDisconnect {
                millis_until_auto_disconnect_resign: millis_until,
                was_by_choice,
            },
        );
        let _ = opponent;
    }

    fn resign_duration(&self, not_by_choice: bool, resignable: bool) -> Duration {
        if not_by_choice && resignable {
            self.config.auto_resign_not_by_choice
        } else {
            self.config.auto_resign_by_choice
        }
    }

    /// §4.5 step 3. Clears all four disconnect fields (besides `start_id`,
    /// which this also clears as part of resetting the whole struct) and
    /// cancels both the cushion and auto-resign timers if still pending.
    pub fn cancel_disconnect_timer(&self, info: &mut MatchInfo, color: Color, dont_notify_opponent: bool) {
        let disconnect = std::mem::take(&mut info.player_mut(color).disconnect);
        if let Some(start_id) = disconnect.start_id {
            self.scheduler.cancel(start_id);
        }
        if let Some(timeout_id) = disconnect.timeout_id {
            self.scheduler.cancel(timeout_id);
        }

        if disconnect.time_to_auto_loss.is_some() && !dont_notify_opponent {
            send_to_opponent(info, color, &OutboundGameMessage::OpponentDisconnectReturn);
        }
    }

    /// §4.5 step 4: used on conclusion, where the opponent is about to be
    /// told the game is over anyway.
    pub fn cancel_disconnect_timers(&self, info: &mut MatchInfo) {
        for color in [Color::White, Color::Black] {
            self.cancel_disconnect_timer(info, color, true);
        }
    }

    /// §4.5 AFK flow. Caller has already checked the preconditions (not
    /// over, untimed, resignable, sender's turn, no disconnect timer
    /// armed for color).
    pub fn on_afk<F>(&self, info: &mut MatchInfo, color: Color, now: DateTime<Utc>, on_lost: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let fire_at = now + self.config.afk_auto_resign;
        let handle = self.scheduler.schedule(fire_at, on_lost);
        info.auto_afk_resign_timeout_id = Some(handle);
        info.auto_afk_resign_time = Some(fire_at);

        let millis_until = (fire_at - now).num_milliseconds().max(0);
        send_to_opponent(
            info,
            color,
            &OutboundGameMessage::OpponentAfk { millis_until_auto_afk_resign: millis_until },
        );
    }

    pub fn on_afk_return(&self, info: &mut MatchInfo, color: Color) {
        self.cancel_auto_afk_resign_timer(info, true, color);
    }

    /// `notified_color` is the color whose AFK state is ending; the
    /// opponent notification goes to *its* opponent, matching §4.5's
    /// "send the opponent of whosTurn."
    pub fn cancel_auto_afk_resign_timer(&self, info: &mut MatchInfo, alert_opponent: bool, notified_color: Color) {
        let had_timer = info.auto_afk_resign_timeout_id.is_some();
        if let Some(handle) = info.auto_afk_resign_timeout_id.take() {
            self.scheduler.cancel(handle);
        }
        info.auto_afk_resign_time = None;

        if had_timer && alert_opponent {
            send_to_opponent(info, notified_color, &OutboundGameMessage::OpponentAfkReturn);
        }
    }

    /// Resign-on-time path: schedules `on_lost` at the mover's remaining
    /// time, cancelling whatever time-loss timer was previously armed.
    pub fn schedule_time_loss<F>(
        &self,
        info: &mut MatchInfo,
        remaining_millis: i64,
        now: DateTime<Utc>,
        on_lost: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        if let Some(old) = info.auto_time_loss_timeout_id.take() {
            self.scheduler.cancel(old);
        }
        let fire_at = now + Duration::milliseconds(remaining_millis.max(0));
        info.auto_time_loss_timeout_id = Some(self.scheduler.schedule(fire_at, on_lost));
    }

    pub fn cancel_time_loss_timer(&self, info: &mut MatchInfo) {
        if let Some(handle) = info.auto_time_loss_timeout_id.take() {
            self.scheduler.cancel(handle);
        }
    }

    pub fn schedule_delete<F>(&self, delay: Duration, now: DateTime<Utc>, on_delete: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.scheduler.schedule(now + delay, on_delete)
    }

    pub fn cancel_delete_timer(&self, info: &mut MatchInfo) {
        if let Some(handle) = info.delete_timeout_id.take() {
            self.scheduler.cancel(handle);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::match_info::{Disconnect, PlayerData};
    use crate::domain::Publicity;
    use crate::domain::identity::PlayerIdentity;
    use crate::time_source::VirtualClock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn sample_info() -> MatchInfo {
        let mut player_data = HashMap::new();
        player_data.insert(
            Color::White,
            PlayerData::new(PlayerIdentity::Guest { browser_id: "w".into() }),
        );
        player_data.insert(
            Color::Black,
            PlayerData::new(PlayerIdentity::Guest { browser_id: "b".into() }),
        );
        MatchInfo {
            id: 1,
            time_created: Utc::now(),
            time_ended: None,
            publicity: Publicity::Private,
            rated: false,
            player_data,
            auto_time_loss_timeout_id: None,
            auto_afk_resign_timeout_id: None,
            auto_afk_resign_time: None,
            draw_offer: Default::default(),
            delete_timeout_id: None,
            position_pasted: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_timer_never_holds_a_later_deadline_than_an_existing_afk_timer() {
        let vc = VirtualClock::new(Utc::now());
        let scheduler = Scheduler::spawn(vc.clone());
        let engine = TimerEngine::new(scheduler, TimerEngineConfig::default());
        let mut info = sample_info();
        let now = vc.now();

        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        engine.on_afk(&mut info, Color::White, now, move || {
            fired_clone.store(true, Ordering::SeqCst);
        });
        let afk_deadline = info.auto_afk_resign_time.unwrap();

        engine.start_disconnect_timer(
            &mut info,
            Color::White,
            true,
            true,
            Some(Color::White),
            now,
            || {},
        );

        let new_deadline = info.player(Color::White).disconnect.time_to_auto_loss.unwrap();
        assert!(new_deadline <= afk_deadline);
        assert!(info.auto_afk_resign_timeout_id.is_none(), "adopting cancels the AFK timer");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disconnect_timer_clears_all_four_fields() {
        let vc = VirtualClock::new(Utc::now());
        let scheduler = Scheduler::spawn(vc.clone());
        let engine = TimerEngine::new(scheduler, TimerEngineConfig::default());
        let mut info = sample_info();
        let now = vc.now();

        engine.start_disconnect_timer(&mut info, Color::Black, false, true, None, now, || {});
        assert!(info.player(Color::Black).disconnect.is_armed());

        engine.cancel_disconnect_timer(&mut info, Color::Black, true);
        let d = &info.player(Color::Black).disconnect;
        assert!(d.start_id.is_none());
        assert!(d.timeout_id.is_none());
        assert!(d.time_to_auto_loss.is_none());
        assert!(d.was_by_choice.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn afk_and_disconnect_timers_are_mutually_exclusive() {
        let vc = VirtualClock::new(Utc::now());
        let scheduler = Scheduler::spawn(vc.clone());
        let engine = TimerEngine::new(scheduler, TimerEngineConfig::default());
        let mut info = sample_info();
        let now = vc.now();

        engine.on_afk(&mut info, Color::White, now, || {});
        assert!(info.auto_afk_resign_timeout_id.is_some());

        engine.start_disconnect_timer(&mut info, Color::White, false, true, Some(Color::White), now, || {});
        assert!(info.auto_afk_resign_timeout_id.is_none());
        assert!(info.player(Color::White).disconnect.is_armed());
    }

    #[test]
    fn disconnect_default_is_unarmed() {
        let d = Disconnect::default();
        assert!(!d.is_armed());
    }
}
