//! Frame kind definitions
//!
//! Every frame carries a single ASCII code identifying its kind. Several
//! codes are used in both directions with different meanings (for example
//! `C` is a connect request when sent and a connection notice when
//! received).

/// Frame kinds, named by their client→server meaning where one exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// `P` - application login
    Login,
    /// `R` - version query / response
    Version,
    /// `G` - port information query / response
    PortInfo,
    /// `g` - port capabilities query / response
    PortCaps,
    /// `X` - register callsign / registration result
    RegisterCallsign,
    /// `x` - unregister callsign
    UnregisterCallsign,
    /// `y` - frames outstanding on a port
    FramesOnPort,
    /// `Y` - frames outstanding on a connection
    FramesOnConnection,
    /// `H` - heard stations on a port
    Heard,
    /// `m` - toggle monitoring
    ToggleMonitoring,
    /// `M` - send unproto
    Unproto,
    /// `V` - send unproto through a via path
    UnprotoVia,
    /// `C` - connect / connection established
    Connect,
    /// `v` - connect through a via path
    ConnectVia,
    /// `c` - connect with an explicit PID
    ConnectWithPid,
    /// `D` - connected data, both directions
    Data,
    /// `d` - disconnect / disconnected
    Disconnect,
    /// `U` - monitored unproto frame
    MonitoredUnproto,
    /// `I` - monitored connected (information) frame
    MonitoredConnected,
    /// `S` - monitored supervisory frame
    MonitoredSupervisory,
    /// `T` - monitored own frame
    MonitoredOwn,
    /// `K` - raw AX.25 frame, both directions
    Raw,
    /// `k` - toggle raw frame reception
    ToggleRaw,
    /// A code this crate does not know about
    Unknown(u8),
}

/// Payload length the server must use for a kind, when fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveLength {
    Fixed(usize),
    Variable,
    /// The kind is only ever sent by the client
    NotPermitted,
}

impl FrameKind {
    /// All known kinds, in code order of the protocol reference
    pub const ALL: [FrameKind; 23] = [
        FrameKind::Login,
        FrameKind::Version,
        FrameKind::PortInfo,
        FrameKind::PortCaps,
        FrameKind::RegisterCallsign,
        FrameKind::UnregisterCallsign,
        FrameKind::FramesOnPort,
        FrameKind::FramesOnConnection,
        FrameKind::Heard,
        FrameKind::ToggleMonitoring,
        FrameKind::Unproto,
        FrameKind::UnprotoVia,
        FrameKind::Connect,
        FrameKind::ConnectVia,
        FrameKind::ConnectWithPid,
        FrameKind::Data,
        FrameKind::Disconnect,
        FrameKind::MonitoredUnproto,
        FrameKind::MonitoredConnected,
        FrameKind::MonitoredSupervisory,
        FrameKind::MonitoredOwn,
        FrameKind::Raw,
        FrameKind::ToggleRaw,
    ];

    /// Wire code for this kind
    pub fn code(self) -> u8 {
        match self {
            FrameKind::Login => b'P',
            FrameKind::Version => b'R',
            FrameKind::PortInfo => b'G',
            FrameKind::PortCaps => b'g',
            FrameKind::RegisterCallsign => b'X',
            FrameKind::UnregisterCallsign => b'x',
            FrameKind::FramesOnPort => b'y',
            FrameKind::FramesOnConnection => b'Y',
            FrameKind::Heard => b'H',
            FrameKind::ToggleMonitoring => b'm',
            FrameKind::Unproto => b'M',
            FrameKind::UnprotoVia => b'V',
            FrameKind::Connect => b'C',
            FrameKind::ConnectVia => b'v',
            FrameKind::ConnectWithPid => b'c',
            FrameKind::Data => b'D',
            FrameKind::Disconnect => b'd',
            FrameKind::MonitoredUnproto => b'U',
            FrameKind::MonitoredConnected => b'I',
            FrameKind::MonitoredSupervisory => b'S',
            FrameKind::MonitoredOwn => b'T',
            FrameKind::Raw => b'K',
            FrameKind::ToggleRaw => b'k',
            FrameKind::Unknown(code) => code,
        }
    }

    /// Kind for a wire code
    pub fn from_code(code: u8) -> Self {
        FrameKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.code() == code)
            .unwrap_or(FrameKind::Unknown(code))
    }

    /// Expected payload length of this kind when received from the server
    pub fn receive_length(self) -> ReceiveLength {
        match self {
            FrameKind::Version => ReceiveLength::Fixed(8),
            FrameKind::PortCaps => ReceiveLength::Fixed(12),
            FrameKind::RegisterCallsign => ReceiveLength::Fixed(1),
            FrameKind::FramesOnPort | FrameKind::FramesOnConnection => ReceiveLength::Fixed(4),
            FrameKind::PortInfo
            | FrameKind::Heard
            | FrameKind::Connect
            | FrameKind::Data
            | FrameKind::Disconnect
            | FrameKind::MonitoredUnproto
            | FrameKind::MonitoredConnected
            | FrameKind::MonitoredSupervisory
            | FrameKind::MonitoredOwn
            | FrameKind::Raw => ReceiveLength::Variable,
            FrameKind::Login
            | FrameKind::UnregisterCallsign
            | FrameKind::ToggleMonitoring
            | FrameKind::Unproto
            | FrameKind::UnprotoVia
            | FrameKind::ConnectVia
            | FrameKind::ConnectWithPid
            | FrameKind::ToggleRaw
            | FrameKind::Unknown(_) => ReceiveLength::NotPermitted,
        }
    }

    /// True for frames reporting overheard traffic
    pub fn is_monitor(self) -> bool {
        matches!(
            self,
            FrameKind::MonitoredUnproto
                | FrameKind::MonitoredConnected
                | FrameKind::MonitoredSupervisory
                | FrameKind::MonitoredOwn
        )
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.code();
        if code.is_ascii_graphic() {
            write!(f, "'{}'", code as char)
        } else {
            write!(f, "0x{:02x}", code)
        }
    }
}
