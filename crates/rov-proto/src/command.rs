use bytes::{BufMut, Bytes, BytesMut};

/// Every command on the wire ends with CR.
pub const TERMINATOR: u8 = 13;

pub const FORWARD: u8 = b'f';
pub const BACKWARD: u8 = b'b';
pub const LEFT: u8 = b'l';
pub const RIGHT: u8 = b'r';
pub const STEERING_COMP: u8 = b'c';
pub const CAMERA_MOVE: u8 = b'v';
pub const ECHO: u8 = b'e';
pub const SONAR_PING: u8 = b'd';
pub const STOP: u8 = b's';
pub const GET_VERSION: u8 = b'y';
pub const CAMERA_RELEASE: u8 = b'w';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Forward(u8),
    Backward(u8),
    Left(u8),
    Right(u8),
    SteeringComp(u8),
    CameraMove(u8),
    /// Firmware echoes every received command back when on.
    Echo(bool),
    SonarPing,
    Stop,
    GetVersion,
    CameraRelease,
}

impl Command {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Forward(_) => FORWARD,
            Command::Backward(_) => BACKWARD,
            Command::Left(_) => LEFT,
            Command::Right(_) => RIGHT,
            Command::SteeringComp(_) => STEERING_COMP,
            Command::CameraMove(_) => CAMERA_MOVE,
            Command::Echo(_) => ECHO,
            Command::SonarPing => SONAR_PING,
            Command::Stop => STOP,
            Command::GetVersion => GET_VERSION,
            Command::CameraRelease => CAMERA_RELEASE,
        }
    }

    pub fn arg(&self) -> Option<u8> {
        match *self {
            Command::Forward(v)
            | Command::Backward(v)
            | Command::Left(v)
            | Command::Right(v)
            | Command::SteeringComp(v)
            | Command::CameraMove(v) => Some(v),
            Command::Echo(on) => Some(if on { b'1' } else { b'0' }),
            Command::SonarPing | Command::Stop | Command::GetVersion | Command::CameraRelease => None,
        }
    }

    /// Opcode, optional argument and terminator, ready for a single write.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(3);
        buf.put_u8(self.opcode());
        if let Some(arg) = self.arg() {
            buf.put_u8(arg);
        }
        buf.put_u8(TERMINATOR);
        buf.freeze()
    }

    /// Decodes one command body (terminator already stripped).
    pub fn decode(body: &[u8]) -> Option<Command> {
        let (&op, rest) = body.split_first()?;
        let arg = match rest {
            [] => None,
            [a] => Some(*a),
            _ => return None,
        };
        let cmd = match (op, arg) {
            (FORWARD, Some(v)) => Command::Forward(v),
            (BACKWARD, Some(v)) => Command::Backward(v),
            (LEFT, Some(v)) => Command::Left(v),
            (RIGHT, Some(v)) => Command::Right(v),
            (STEERING_COMP, Some(v)) => Command::SteeringComp(v),
            (CAMERA_MOVE, Some(v)) => Command::CameraMove(v),
            (ECHO, Some(b'1')) => Command::Echo(true),
            (ECHO, Some(b'0')) => Command::Echo(false),
            (SONAR_PING, None) => Command::SonarPing,
            (STOP, None) => Command::Stop,
            (GET_VERSION, None) => Command::GetVersion,
            (CAMERA_RELEASE, None) => Command::CameraRelease,
            _ => return None,
        };
        Some(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_full_speed_is_three_bytes() {
        assert_eq!(&Command::Forward(255).encode()[..], &[0x66, 0xFF, 0x0D]);
    }

    #[test]
    fn bare_commands_have_no_argument() {
        assert_eq!(&Command::Stop.encode()[..], b"s\r");
        assert_eq!(&Command::GetVersion.encode()[..], b"y\r");
        assert_eq!(&Command::CameraRelease.encode()[..], b"w\r");
        assert_eq!(&Command::SonarPing.encode()[..], b"d\r");
    }

    #[test]
    fn echo_argument_is_ascii_digit() {
        assert_eq!(&Command::Echo(true).encode()[..], b"e1\r");
        assert_eq!(&Command::Echo(false).encode()[..], b"e0\r");
    }

    #[test]
    fn decode_rejects_missing_or_extra_argument() {
        assert_eq!(Command::decode(b"f"), None);
        assert_eq!(Command::decode(b"s1"), None);
        assert_eq!(Command::decode(b"v\x46"), Some(Command::CameraMove(70)));
        assert_eq!(Command::decode(b""), None);
    }
}
