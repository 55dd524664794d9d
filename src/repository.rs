//! Repository references.
//!
//! A repository is addressed either by an `owner/name` slug or by the
//! numeric identifier some providers assign. Sources resolve the reference
//! into provider-specific API calls; the only contract enforced here is
//! that a slug-based source can obtain a non-empty owner and name *before*
//! making any network call.

use crate::error::{BinupError, Result};

/// A reference to a repository on a code-hosting platform.
///
/// # Examples
///
/// ```
/// use binup::Repository;
///
/// let repo = Repository::parse_slug("creativeprojects/resticprofile");
/// assert_eq!(repo.slug().unwrap(), ("creativeprojects", "resticprofile"));
///
/// // URL-derived slugs keep the encoded separator
/// let repo = Repository::parse_slug("creativeprojects%2Fresticprofile");
/// assert!(repo.slug().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Repository {
    /// An `owner/name` pair.
    Slug {
        /// Repository owner (user or organization)
        owner: String,
        /// Repository name
        name: String,
    },
    /// A provider-assigned numeric identifier.
    Id(i64),
}

impl Repository {
    /// Parses an `owner/name` slug, also accepting the URL-encoded
    /// `owner%2Fname` form.
    ///
    /// Parsing never fails: a malformed slug produces a reference with
    /// empty components, which [`slug`](Self::slug) rejects before any
    /// network call is made.
    #[must_use]
    pub fn parse_slug(slug: &str) -> Self {
        let mut parts: Vec<&str> = slug.split('/').collect();
        if parts.len() != 2 {
            // give it another try with the url-encoded separator
            parts = slug.split("%2F").collect();
        }
        let (owner, name) = match parts.as_slice() {
            [owner, name] => ((*owner).to_string(), (*name).to_string()),
            _ => (String::new(), String::new()),
        };
        Self::Slug { owner, name }
    }

    /// Builds a reference from explicit owner and name components.
    #[must_use]
    pub fn from_parts(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Slug { owner: owner.into(), name: name.into() }
    }

    /// Builds a reference from a provider-assigned numeric identifier.
    #[must_use]
    pub const fn from_id(id: i64) -> Self {
        Self::Id(id)
    }

    /// Returns the `(owner, name)` pair of a slug-based reference.
    ///
    /// # Errors
    ///
    /// [`BinupError::InvalidRepository`] when either component is empty or
    /// the reference only carries a numeric ID. Sources that address
    /// repositories by slug call this before any network I/O, so a broken
    /// reference fails fast.
    pub fn slug(&self) -> Result<(&str, &str)> {
        match self {
            Self::Slug { owner, name } => {
                if owner.is_empty() && name.is_empty() {
                    return Err(BinupError::InvalidRepository {
                        reason: "empty repository slug".to_string(),
                    });
                }
                if owner.is_empty() {
                    return Err(BinupError::InvalidRepository {
                        reason: "empty owner in repository slug".to_string(),
                    });
                }
                if name.is_empty() {
                    return Err(BinupError::InvalidRepository {
                        reason: "empty name in repository slug".to_string(),
                    });
                }
                Ok((owner, name))
            }
            Self::Id(id) => Err(BinupError::InvalidRepository {
                reason: format!("repository ID {id} cannot be resolved to an owner/name slug"),
            }),
        }
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slug { owner, name } => write!(f, "{owner}/{name}"),
            Self::Id(id) => write!(f, "#{id}"),
        }
    }
}
