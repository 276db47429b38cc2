use crate::command::GET_VERSION;

/// Classification of one inbound frame, in the firmware's priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response<'a> {
    /// The board just powered up or rebooted.
    Reset,
    Version(&'a str),
    /// Echo of our own version query.
    Ping,
    /// Sonar range in centimetres.
    Distance(i32),
    /// A `cm` frame whose number did not parse.
    Malformed(&'a str),
    Feedback(&'a str),
}

impl<'a> Response<'a> {
    pub fn classify(frame: &'a str) -> Self {
        if frame == "reset" {
            return Response::Reset;
        }
        if let Some(v) = frame.strip_prefix("version:") {
            return Response::Version(v);
        }
        if frame.as_bytes().first() == Some(&GET_VERSION) {
            return Response::Ping;
        }
        if let Some(rest) = frame.strip_prefix("cm") {
            return match rest.strip_prefix(' ').and_then(|n| n.trim().parse().ok()) {
                Some(cm) => Response::Distance(cm),
                None => Response::Malformed(frame),
            };
        }
        Response::Feedback(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order() {
        assert_eq!(Response::classify("reset"), Response::Reset);
        assert_eq!(Response::classify("version:1.4"), Response::Version("1.4"));
        assert_eq!(Response::classify("y"), Response::Ping);
        assert_eq!(Response::classify("cm 45"), Response::Distance(45));
        assert_eq!(Response::classify("motors on"), Response::Feedback("motors on"));
    }

    #[test]
    fn reset_must_match_exactly() {
        assert_eq!(Response::classify("resetting"), Response::Feedback("resetting"));
    }

    #[test]
    fn bad_distance_is_malformed() {
        assert_eq!(Response::classify("cm abc"), Response::Malformed("cm abc"));
        assert_eq!(Response::classify("cm"), Response::Malformed("cm"));
        assert_eq!(Response::classify("cm12"), Response::Malformed("cm12"));
    }

    #[test]
    fn distance_prefix_is_case_sensitive() {
        assert_eq!(Response::classify("CM 40"), Response::Feedback("CM 40"));
    }

    #[test]
    fn empty_version_is_still_a_version() {
        assert_eq!(Response::classify("version:"), Response::Version(""));
    }
}
