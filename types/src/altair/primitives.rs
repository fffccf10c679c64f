// TODO(Grandine Team): Consider using `bitflags` or `enumset` instead.
pub type ParticipationFlags = u8;
