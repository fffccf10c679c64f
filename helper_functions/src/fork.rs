use core::num::NonZeroU64;

use types::{config::Config, nonstandard::Phase, preset::Preset};

/// Phase-dependent constants used by reward and score processing.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RewardParameters {
    pub inactivity_penalty_quotient: NonZeroU64,
    pub bail_out: Option<BailOutParameters>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BailOutParameters {
    pub score_bias: u64,
    pub score_threshold: u64,
    pub recovery_threshold: u64,
    pub recovery: u64,
}

impl RewardParameters {
    #[must_use]
    pub fn new<P: Preset>(config: &Config, phase: Phase) -> Self {
        let inactivity_penalty_quotient = match phase {
            Phase::Phase0 => P::INACTIVITY_PENALTY_QUOTIENT,
            Phase::Altair => P::INACTIVITY_PENALTY_QUOTIENT_ALTAIR,
            Phase::Bellatrix | Phase::Capella => P::INACTIVITY_PENALTY_QUOTIENT_BELLATRIX,
            Phase::Alpaca | Phase::Badger => P::INACTIVITY_PENALTY_QUOTIENT_ALPACA,
        };

        let bail_out = phase.has_tokenomics().then(|| BailOutParameters {
            score_bias: config.bail_out_score_bias,
            score_threshold: config.bail_out_score_threshold,
            recovery_threshold: config.bail_out_score_recovery_threshold,
            recovery: config.bail_out_score_recovery(phase),
        });

        Self {
            inactivity_penalty_quotient,
            bail_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use types::preset::Mainnet;

    use super::*;

    #[test]
    fn inactivity_penalty_quotient_changes_across_phases() {
        let config = Config::mainnet();
        let quotient =
            |phase| RewardParameters::new::<Mainnet>(&config, phase).inactivity_penalty_quotient;

        assert_eq!(quotient(Phase::Phase0).get(), 1 << 26);
        assert_eq!(quotient(Phase::Altair).get(), 3 << 24);
        assert_eq!(quotient(Phase::Bellatrix), quotient(Phase::Capella));
        assert_eq!(quotient(Phase::Alpaca), quotient(Phase::Badger));
        assert_ne!(quotient(Phase::Capella), quotient(Phase::Alpaca));
    }

    #[test]
    fn bail_out_parameters_exist_only_with_tokenomics() {
        let config = Config::mainnet();

        assert_eq!(RewardParameters::new::<Mainnet>(&config, Phase::Capella).bail_out, None);

        let alpaca = RewardParameters::new::<Mainnet>(&config, Phase::Alpaca).bail_out;
        let badger = RewardParameters::new::<Mainnet>(&config, Phase::Badger).bail_out;

        assert_eq!(
            alpaca.map(|parameters| parameters.recovery),
            Some(config.bail_out_score_recovery_alpaca),
        );
        assert_eq!(
            badger.map(|parameters| parameters.recovery),
            Some(config.bail_out_score_recovery_badger),
        );
        assert_eq!(
            alpaca.map(|parameters| parameters.score_threshold),
            badger.map(|parameters| parameters.score_threshold),
        );
    }
}
