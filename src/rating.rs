//! Glicko-1 rating arithmetic (§1 Non-goal: "Rating math — consumed as a
//! pure function"). Deliberately the one module in this crate with zero
//! dependencies beyond `f64`: no access to the registry, no I/O, nothing
//! that makes it anything other than a pure function `deleteGame`'s
//! rated-log path calls and forwards to a repository.

pub mod glicko1 {
    use std::f64::consts::PI;

    const DEFAULT_RATING: f64 = 1500.0;
    /// Below this many periods of raw confidence, a rating is reported as
    /// "not yet confident" (mirrors the usual Glicko onboarding cutoff).
    const CONFIDENT_RD: f64 = 120.0;

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Rating {
        pub value: f64,
        pub deviation: f64,
    }

    impl Rating {
        pub fn unrated() -> Rating {
            Rating { value: DEFAULT_RATING, deviation: 350.0 }
        }

        pub fn is_confident(&self) -> bool {
            self.deviation <= CONFIDENT_RD
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Outcome {
        pub opponent: Rating,
        /// 1.0 win, 0.5 draw, 0.0 loss.
        pub score: f64,
    }

    fn g(rd: f64) -> f64 {
        let q = 10f64.ln() / 400.0;
        1.0 / (1.0 + 3.0 * q.powi(2) * rd.powi(2) / PI.powi(2)).sqrt()
    }

    fn e(rating: f64, opponent_rating: f64, opponent_rd: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf(-g(opponent_rd) * (rating - opponent_rating) / 400.0))
    }

    /// Applies one or more game outcomes (a single game in this crate's
    /// case) to `player`, returning the updated rating and the signed
    /// change in rating value. Standard Glicko-1 single-period update.
    pub fn update(player: Rating, outcomes: &[Outcome]) -> (Rating, f64) {
        if outcomes.is_empty() {
            return (player, 0.0);
        }

        let q = 10f64.ln() / 400.0;

        let d_squared_inv: f64 = outcomes
            .iter()
            .map(|o| {
                let g_rd = g(o.opponent.deviation);
                let e_val = e(player.value, o.opponent.value, o.opponent.deviation);
                q.powi(2) * g_rd.powi(2) * e_val * (1.0 - e_val)
            })
            .sum();
        let d_squared = 1.0 / d_squared_inv;

        let sum: f64 = outcomes
            .iter()
            .map(|o| {
                let g_rd = g(o.opponent.deviation);
                let e_val = e(player.value, o.opponent.value, o.opponent.deviation);
                g_rd * (o.score - e_val)
            })
            .sum();

        let new_value = player.value + (q / (1.0 / player.deviation.powi(2) + 1.0 / d_squared)) * sum;
        let new_deviation = (1.0 / (1.0 / player.deviation.powi(2) + 1.0 / d_squared)).sqrt();

        (
            Rating { value: new_value, deviation: new_deviation },
            new_value - player.value,
        )
    }

    #[cfg(test)]
    mod test {
        use super::*;

        #[test]
        fn winning_against_a_confident_opponent_raises_rating() {
            let player = Rating { value: 1500.0, deviation: 200.0 };
            let opponent = Rating { value: 1500.0, deviation: 30.0 };
            let (updated, change) = update(player, &[Outcome { opponent, score: 1.0 }]);
            assert!(change > 0.0);
            assert!(updated.value > player.value);
        }

        #[test]
        fn losing_lowers_rating() {
            let player = Rating { value: 1500.0, deviation: 200.0 };
            let opponent = Rating { value: 1500.0, deviation: 30.0 };
            let (updated, change) = update(player, &[Outcome { opponent, score: 0.0 }]);
            assert!(change < 0.0);
            assert!(updated.value < player.value);
        }

        #[test]
        fn no_outcomes_leaves_rating_unchanged() {
            let player = Rating { value: 1500.0, deviation: 200.0 };
            let (updated, change) = update(player, &[]);
            assert_eq!(updated, player);
            assert_eq!(change, 0.0);
        }
    }
}
