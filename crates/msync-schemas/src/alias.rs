use std::fmt;

/// Local part of a room alias, e.g. `course_42`.
///
/// The alias is the only lookup key for a room. It is derived purely from
/// its inputs so repeated passes always address the same room.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomAlias(String);

impl RoomAlias {
    pub fn for_room(room_type: &str, id: &str) -> Self {
        Self(format!("{room_type}_{id}"))
    }

    /// School-wide announcement room.
    pub fn announcement(school_id: &str) -> Self {
        Self::for_room("news", school_id)
    }

    /// Staff-only room.
    pub fn staff(school_id: &str) -> Self {
        Self::for_room("teachers", school_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn qualify(&self, servername: &str) -> FullyQualifiedAlias {
        FullyQualifiedAlias {
            alias: self.clone(),
            servername: servername.to_string(),
        }
    }
}

impl fmt::Display for RoomAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `#alias:servername`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullyQualifiedAlias {
    alias: RoomAlias,
    servername: String,
}

impl FullyQualifiedAlias {
    pub fn alias(&self) -> &RoomAlias {
        &self.alias
    }

    pub fn servername(&self) -> &str {
        &self.servername
    }

    /// Form used inside a URL path: the leading `#` must be percent-encoded.
    pub fn path_segment(&self) -> String {
        format!("%23{}:{}", self.alias, self.servername)
    }
}

impl fmt::Display for FullyQualifiedAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.alias, self.servername)
    }
}
