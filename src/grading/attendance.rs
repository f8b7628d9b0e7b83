/// Attendance percentage for a single subject.
///
/// Returns 0 when no classes were held. Expects `attended <= total`; the
/// validation layer rejects anything else before it gets here.
pub fn percentage_of(attended: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(attended) / f64::from(total) * 100.0
}
