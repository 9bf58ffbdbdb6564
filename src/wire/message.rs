//! Broadcast message carrying profile snapshots to a recipient set

use crate::profile::Profile;
use crate::types::{MemberId, ProtocolVersion};
use crate::wire::Error;
use byteordered::ByteOrdered;
use std::collections::BTreeSet;
use std::fmt;
use std::io::{Read, Write};

/// Fire-and-forget broadcast of a member's resource profile.
///
/// The current protocol always sends a single profile, but the payload
/// remains a list so messages from older members carrying several
/// profiles still decode during a rolling upgrade. Recipients travel in
/// the transport envelope, not the payload.
#[derive(Debug, PartialEq, Eq)]
pub struct ProfileMessage {
    recipients: BTreeSet<MemberId>,
    processor_id: i32,
    profiles: Option<Vec<Profile>>,
}

impl ProfileMessage {
    pub fn new(recipients: BTreeSet<MemberId>, profile: Profile) -> Self {
        Self {
            recipients,
            processor_id: 0,
            profiles: Some(vec![profile]),
        }
    }

    pub fn recipients(&self) -> &BTreeSet<MemberId> {
        &self.recipients
    }

    pub fn profiles(&self) -> &[Profile] {
        self.profiles.as_deref().unwrap_or_default()
    }

    pub fn into_profiles(self) -> Vec<Profile> {
        self.profiles.unwrap_or_default()
    }

    pub fn read<R: Read>(r: &mut R, peer_version: ProtocolVersion) -> Result<Self, Error> {
        let mut r = ByteOrdered::new(r, byteordered::Endianness::Big);

        let processor_id = r.read_i32()?;
        let count = r.read_i32()?;
        let profiles = if count == -1 {
            None
        } else {
            // The count is wire-controlled; never preallocate from it
            let mut profiles = Vec::new();
            for _ in 0..count {
                profiles.push(Profile::read(&mut r, peer_version)?);
            }
            Some(profiles)
        };

        Ok(Self {
            recipients: BTreeSet::new(),
            processor_id,
            profiles,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W, peer_version: ProtocolVersion) -> Result<(), Error> {
        let mut w = ByteOrdered::new(w, byteordered::Endianness::Big);

        w.write_i32(self.processor_id)?;
        match &self.profiles {
            None => w.write_i32(-1)?,
            Some(profiles) => {
                w.write_i32(profiles.len() as i32)?;
                for profile in profiles {
                    profile.write(&mut w, peer_version)?;
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for ProfileMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProfileMessage(processor_id={}; profiles=[", self.processor_id)?;
        for (i, profile) in self.profiles().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{profile}")?;
        }
        write!(f, "])")
    }
}
