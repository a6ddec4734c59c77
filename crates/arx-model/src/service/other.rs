use std::sync::Arc;

use arx_store::{Binary, ContentPayload, Listing, StorageError, StoragePath, StorageService};
use tracing::debug;

use super::{binaries_only, failed, list_or_empty, parse_listing, ModelService};
use crate::error::ModelResult;
use crate::metadata::OtherMetadata;
use crate::notify::ModelEvent;
use crate::parse::other_from_path;
use crate::paths::{aip_path, other_metadata_path, representation_path, METADATA, OTHER};

fn other_listing(
    storage: &dyn StorageService,
    scope: &StoragePath,
    metadata_type: Option<&str>,
) -> ModelResult<Listing<ModelResult<OtherMetadata>>> {
    let mut dir = scope.join(&[METADATA, OTHER])?;
    if let Some(t) = metadata_type {
        dir = dir.child(t)?;
    }
    let listing = list_or_empty(storage, &dir, scope, true)?;
    Ok(parse_listing(binaries_only(listing), |r| other_from_path(r.path())))
}

impl ModelService {
    pub fn retrieve_other_metadata_binary(&self, om: &OtherMetadata) -> ModelResult<Binary> {
        Ok(self.storage.get_binary(&other_metadata_path(om)?)?)
    }

    /// Store an other-metadata artifact, overwriting any previous content.
    pub fn create_other_metadata(
        &self,
        om: &OtherMetadata,
        payload: &ContentPayload,
        notify: bool,
    ) -> ModelResult<OtherMetadata> {
        let path = other_metadata_path(om)?;
        self.require_scope(Some(om.aip_id.as_str()), om.representation_id.as_deref())?;
        match self.storage.create_binary(&path, payload, false) {
            Ok(_) => debug!(path = %path, "created other metadata"),
            Err(StorageError::AlreadyExists(_)) => {
                self.storage.update_binary_content(&path, payload, false, false)?;
                debug!(path = %path, "overwrote other metadata");
            }
            Err(e) => return Err(e.into()),
        }
        self.publish(notify, ModelEvent::OtherMetadataCreated(om.clone()));
        Ok(om.clone())
    }

    /// Other metadata of an AIP, of one type or of all types.
    ///
    /// With `include_representations`, each representation's items follow
    /// the AIP-level ones, in declaration order.
    pub fn list_other_metadata(
        &self,
        aip_id: &str,
        metadata_type: Option<&str>,
        include_representations: bool,
    ) -> ModelResult<Listing<ModelResult<OtherMetadata>>> {
        let aip = self.load_aip(aip_id)?;
        let head = other_listing(self.storage.as_ref(), &aip_path(aip_id)?, metadata_type)?;
        if !include_representations {
            return Ok(head);
        }

        let mut parts = vec![head];
        for representation in aip.representations {
            let storage: Arc<dyn StorageService> = Arc::clone(&self.storage);
            let metadata_type = metadata_type.map(str::to_string);
            let scope = representation_path(aip_id, &representation.id)?;
            parts.push(Listing::deferred(move || {
                other_listing(storage.as_ref(), &scope, metadata_type.as_deref()).unwrap_or_else(failed)
            }));
        }
        Ok(Listing::concat(parts))
    }

    pub fn list_representation_other_metadata(
        &self,
        aip_id: &str,
        representation_id: &str,
        metadata_type: Option<&str>,
    ) -> ModelResult<Listing<ModelResult<OtherMetadata>>> {
        other_listing(
            self.storage.as_ref(),
            &representation_path(aip_id, representation_id)?,
            metadata_type,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::fixture;
    use super::*;

    #[test]
    fn create_overwrites_existing_content() {
        let fx = fixture();
        let aip = fx.aip();
        let om = OtherMetadata::for_aip(&aip.id, "tika", ".json");
        fx.service.create_other_metadata(&om, &"{}".into(), true).unwrap();
        fx.service
            .create_other_metadata(&om, &r#"{"v":2}"#.into(), true)
            .unwrap();
        let binary = fx.service.retrieve_other_metadata_binary(&om).unwrap();
        assert_eq!(binary.content.read_all().unwrap().as_ref(), br#"{"v":2}"#);
        assert_eq!(fx.events.kinds(), vec!["other_metadata_created"; 2]);
    }

    #[test]
    fn listing_by_type_and_across_representations() {
        let fx = fixture();
        let aip = fx.aip();
        fx.service.create_representation(&aip.id, "r1", true, false).unwrap();
        for om in [
            OtherMetadata::for_aip(&aip.id, "tika", ".json"),
            OtherMetadata::for_aip(&aip.id, "siegfried", ".json"),
            OtherMetadata::for_representation(&aip.id, "r1", "tika", ".json"),
            OtherMetadata::for_file(&aip.id, "r1", &["d"], "f.pdf", "tika", ".json"),
        ] {
            fx.service.create_other_metadata(&om, &"{}".into(), false).unwrap();
        }

        let tika = fx
            .service
            .list_other_metadata(&aip.id, Some("tika"), true)
            .unwrap()
            .try_collect()
            .unwrap();
        assert_eq!(tika.len(), 3);
        assert!(tika[0].representation_id.is_none());
        assert!(tika.iter().all(|om| om.metadata_type == "tika"));

        assert_eq!(fx.service.list_other_metadata(&aip.id, None, false).unwrap().count(), 2);
        assert_eq!(fx.service.list_other_metadata(&aip.id, None, true).unwrap().count(), 4);
        let file_level = fx
            .service
            .list_representation_other_metadata(&aip.id, "r1", Some("tika"))
            .unwrap()
            .try_collect()
            .unwrap();
        assert!(file_level.contains(&OtherMetadata::for_file(&aip.id, "r1", &["d"], "f.pdf", "tika", ".json")));
    }

    #[test]
    fn listing_unknown_type_is_empty() {
        let fx = fixture();
        let aip = fx.aip();
        assert_eq!(fx.service.list_other_metadata(&aip.id, Some("none"), true).unwrap().count(), 0);
        assert!(fx
            .service
            .list_representation_other_metadata(&aip.id, "r9", None)
            .unwrap_err()
            .is_not_found());
    }
}
