use bit_field::BitField as _;
use enum_iterator::Sequence;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::{AsRefStr, Display, EnumString};

use crate::{
    altair::{
        consts::{TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX},
        primitives::ParticipationFlags,
    },
    error::Error,
};

/// Protocol fork, ordered by activation.
///
/// Code paths compare phases with `<` and `>=` rather than matching on every variant,
/// so the order of variants is significant.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Debug,
    Sequence,
    AsRefStr,
    Display,
    EnumString,
    DeserializeFromStr,
    SerializeDisplay,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Phase {
    #[default]
    Phase0,
    Altair,
    Bellatrix,
    Capella,
    Alpaca,
    Badger,
}

impl TryFrom<u8> for Phase {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        enum_iterator::all::<Self>()
            .nth(value.into())
            .ok_or(Error::UnknownPhase { value })
    }
}

impl Phase {
    #[must_use]
    pub const fn uses_participation_flags(self) -> bool {
        !matches!(self, Self::Phase0)
    }

    #[must_use]
    pub const fn has_tokenomics(self) -> bool {
        matches!(self, Self::Alpaca | Self::Badger)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AttestationEpoch {
    Previous,
    Current,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct Participation {
    pub previous: ParticipationFlags,
    pub current: ParticipationFlags,
}

impl Participation {
    #[inline]
    #[must_use]
    pub fn previous_epoch_matching_source(self) -> bool {
        self.previous.get_bit(TIMELY_SOURCE_FLAG_INDEX)
    }

    #[inline]
    #[must_use]
    pub fn previous_epoch_matching_target(self) -> bool {
        self.previous.get_bit(TIMELY_TARGET_FLAG_INDEX)
    }

    #[inline]
    #[must_use]
    pub fn previous_epoch_matching_head(self) -> bool {
        self.previous.get_bit(TIMELY_HEAD_FLAG_INDEX)
    }

    #[inline]
    #[must_use]
    pub fn current_epoch_matching_source(self) -> bool {
        self.current.get_bit(TIMELY_SOURCE_FLAG_INDEX)
    }

    #[inline]
    #[must_use]
    pub fn current_epoch_matching_target(self) -> bool {
        self.current.get_bit(TIMELY_TARGET_FLAG_INDEX)
    }
}

#[cfg(test)]
mod tests {
    use core::str::FromStr as _;

    use test_case::test_case;

    use super::*;

    #[test]
    fn phases_are_ordered_by_activation() {
        let phases = enum_iterator::all::<Phase>().collect::<Vec<_>>();

        assert!(phases.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(phases.first(), Some(&Phase::Phase0));
        assert_eq!(phases.last(), Some(&Phase::Badger));
    }

    #[test_case(0 => Ok(Phase::Phase0))]
    #[test_case(4 => Ok(Phase::Alpaca))]
    #[test_case(5 => Ok(Phase::Badger))]
    #[test_case(6 => Err(Error::UnknownPhase { value: 6 }))]
    #[test_case(u8::MAX => Err(Error::UnknownPhase { value: u8::MAX }))]
    fn phase_from_discriminator(value: u8) -> Result<Phase, Error> {
        Phase::try_from(value)
    }

    #[test]
    fn phase_parses_case_insensitively() {
        assert_eq!(Phase::from_str("ALPACA").ok(), Some(Phase::Alpaca));
        assert_eq!(Phase::from_str("badger").ok(), Some(Phase::Badger));
        assert!(Phase::from_str("deneb").is_err());
        assert_eq!(Phase::Capella.to_string(), "capella");
    }

    #[test]
    fn participation_decodes_flag_bits() {
        let participation = Participation {
            previous: 0b011,
            current: 0b100,
        };

        assert!(participation.previous_epoch_matching_source());
        assert!(participation.previous_epoch_matching_target());
        assert!(!participation.previous_epoch_matching_head());
        assert!(!participation.current_epoch_matching_source());
        assert!(!participation.current_epoch_matching_target());
    }
}
