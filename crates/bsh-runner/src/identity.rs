// SPDX-License-Identifier: MIT OR Apache-2.0
//! User and group name resolution.

use crate::result::SpawnError;
use nix::unistd::{Group, User};
use std::io;

/// Look up the numeric id of user `name`.
pub fn uid_of(name: &str) -> Result<u32, SpawnError> {
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid.as_raw()),
        Ok(None) => Err(SpawnError::other(
            io::ErrorKind::NotFound,
            format!("no such user: {name}"),
        )),
        Err(errno) => Err(SpawnError::new(io::Error::from(errno))),
    }
}

/// Look up the numeric id of group `name`.
pub fn gid_of(name: &str) -> Result<u32, SpawnError> {
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid.as_raw()),
        Ok(None) => Err(SpawnError::other(
            io::ErrorKind::NotFound,
            format!("no such group: {name}"),
        )),
        Err(errno) => Err(SpawnError::new(io::Error::from(errno))),
    }
}

/// Resolve the effective id: an explicit numeric id wins over a name.
pub(crate) fn resolve(
    id: Option<u32>,
    name: Option<&str>,
    lookup: fn(&str) -> Result<u32, SpawnError>,
) -> Result<Option<u32>, SpawnError> {
    match (id, name) {
        (Some(id), _) => Ok(Some(id)),
        (None, Some(name)) => lookup(name).map(Some),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_user_resolves_to_zero() {
        assert_eq!(uid_of("root").unwrap(), 0);
    }

    #[test]
    fn unknown_user_is_not_found() {
        let err = uid_of("bsh-no-such-user-xyz").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("bsh-no-such-user-xyz"));
    }

    #[test]
    fn unknown_group_is_not_found() {
        assert!(gid_of("bsh-no-such-group-xyz").unwrap_err().is_not_found());
    }

    #[test]
    fn numeric_id_wins_over_name() {
        let r = resolve(Some(7), Some("bsh-no-such-user-xyz"), uid_of).unwrap();
        assert_eq!(r, Some(7));
    }

    #[test]
    fn nothing_set_resolves_to_none() {
        assert_eq!(resolve(None, None, uid_of).unwrap(), None);
    }
}
