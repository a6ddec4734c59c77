use std::sync::Arc;

use arx_store::{Binary, ContentPayload, Listing, StorageService};
use tracing::debug;

use super::{binaries_only, failed, list_or_empty, parse_listing, ModelService};
use crate::error::ModelResult;
use crate::metadata::PreservationMetadata;
use crate::notify::ModelEvent;
use crate::parse::preservation_from_path;
use crate::paths::{
    agents_path, aip_path, aip_preservation_path, preservation_metadata_path, representation_path,
    representation_preservation_path, PRESERVATION_CONTAINER,
};

/// Preservation metadata of one representation.
fn representation_listing(
    storage: &dyn StorageService,
    aip_id: &str,
    representation_id: &str,
) -> ModelResult<Listing<ModelResult<PreservationMetadata>>> {
    let listing = list_or_empty(
        storage,
        &representation_preservation_path(aip_id, representation_id)?,
        &representation_path(aip_id, representation_id)?,
        true,
    )?;
    Ok(parse_listing(binaries_only(listing), |r| preservation_from_path(r.path())))
}

impl ModelService {
    pub fn retrieve_preservation_representation(&self, aip_id: &str, representation_id: &str) -> ModelResult<Binary> {
        self.retrieve_preservation(&PreservationMetadata::representation(aip_id, representation_id))
    }

    pub fn retrieve_preservation_file<S: AsRef<str>>(
        &self,
        aip_id: &str,
        representation_id: &str,
        directory_path: &[S],
        file_id: &str,
    ) -> ModelResult<Binary> {
        self.retrieve_preservation(&PreservationMetadata::file(
            aip_id,
            representation_id,
            directory_path,
            file_id,
        ))
    }

    pub fn retrieve_preservation_event(
        &self,
        aip_id: &str,
        representation_id: Option<&str>,
        event_id: &str,
    ) -> ModelResult<Binary> {
        self.retrieve_preservation(&PreservationMetadata::event(event_id, aip_id, representation_id))
    }

    pub fn retrieve_preservation_agent(&self, agent_id: &str) -> ModelResult<Binary> {
        self.retrieve_preservation(&PreservationMetadata::agent(agent_id))
    }

    fn retrieve_preservation(&self, pm: &PreservationMetadata) -> ModelResult<Binary> {
        Ok(self.storage.get_binary(&preservation_metadata_path(pm)?)?)
    }

    pub fn create_preservation_metadata(
        &self,
        pm: &PreservationMetadata,
        payload: &ContentPayload,
        notify: bool,
    ) -> ModelResult<PreservationMetadata> {
        let path = preservation_metadata_path(pm)?;
        self.require_scope(pm.aip_id.as_deref(), pm.representation_id.as_deref())?;
        self.storage.create_binary(&path, payload, false)?;
        debug!(path = %path, "created preservation metadata");
        self.publish(notify, ModelEvent::PreservationMetadataCreated(pm.clone()));
        Ok(pm.clone())
    }

    /// Overwrite a preservation artifact, creating it if absent.
    pub fn update_preservation_metadata(
        &self,
        pm: &PreservationMetadata,
        payload: &ContentPayload,
        notify: bool,
    ) -> ModelResult<PreservationMetadata> {
        let path = preservation_metadata_path(pm)?;
        self.require_scope(pm.aip_id.as_deref(), pm.representation_id.as_deref())?;
        self.storage.update_binary_content(&path, payload, false, true)?;
        debug!(path = %path, "updated preservation metadata");
        self.publish(notify, ModelEvent::PreservationMetadataUpdated(pm.clone()));
        Ok(pm.clone())
    }

    pub fn delete_preservation_metadata(&self, pm: &PreservationMetadata, notify: bool) -> ModelResult<()> {
        let path = preservation_metadata_path(pm)?;
        self.storage.delete_resource(&path)?;
        debug!(path = %path, "deleted preservation metadata");
        self.publish(notify, ModelEvent::PreservationMetadataDeleted(pm.clone()));
        Ok(())
    }

    /// Preservation metadata of an AIP.
    ///
    /// With `include_representations`, the AIP-level items come first,
    /// followed by each representation's in declaration order. A
    /// representation's listing is only opened once the previous ones are
    /// exhausted.
    pub fn list_preservation_metadata(
        &self,
        aip_id: &str,
        include_representations: bool,
    ) -> ModelResult<Listing<ModelResult<PreservationMetadata>>> {
        let aip = self.load_aip(aip_id)?;
        let head = list_or_empty(
            self.storage.as_ref(),
            &aip_preservation_path(aip_id)?,
            &aip_path(aip_id)?,
            true,
        )?;
        let head = parse_listing(binaries_only(head), |r| preservation_from_path(r.path()));
        if !include_representations {
            return Ok(head);
        }

        let mut parts = vec![head];
        for representation in aip.representations {
            let storage: Arc<dyn StorageService> = Arc::clone(&self.storage);
            let aip_id = aip_id.to_string();
            parts.push(Listing::deferred(move || {
                representation_listing(storage.as_ref(), &aip_id, &representation.id).unwrap_or_else(failed)
            }));
        }
        Ok(Listing::concat(parts))
    }

    pub fn list_representation_preservation_metadata(
        &self,
        aip_id: &str,
        representation_id: &str,
    ) -> ModelResult<Listing<ModelResult<PreservationMetadata>>> {
        representation_listing(self.storage.as_ref(), aip_id, representation_id)
    }

    /// Every registered preservation agent.
    pub fn list_preservation_agents(&self) -> ModelResult<Listing<ModelResult<PreservationMetadata>>> {
        let listing = list_or_empty(
            self.storage.as_ref(),
            &agents_path()?,
            &arx_store::StoragePath::container(PRESERVATION_CONTAINER)?,
            false,
        )?;
        Ok(parse_listing(binaries_only(listing), |r| preservation_from_path(r.path())))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::fixture;
    use super::*;
    use crate::metadata::PreservationMetadataType;

    fn xml() -> ContentPayload {
        ContentPayload::from("<premis/>")
    }

    #[test]
    fn events_agents_and_objects_round_trip() {
        let fx = fixture();
        let aip = fx.aip();
        fx.service.create_representation(&aip.id, "r1", true, false).unwrap();

        let event = PreservationMetadata::event("ev1", &aip.id, None);
        let agent = PreservationMetadata::agent("ag1");
        let object = PreservationMetadata::representation(&aip.id, "r1");
        let file = PreservationMetadata::file(&aip.id, "r1", &["d"], "f.pdf");
        for pm in [&event, &agent, &object, &file] {
            fx.service.create_preservation_metadata(pm, &xml(), true).unwrap();
        }

        assert!(fx.service.retrieve_preservation_event(&aip.id, None, "ev1").is_ok());
        assert!(fx.service.retrieve_preservation_agent("ag1").is_ok());
        assert!(fx.service.retrieve_preservation_representation(&aip.id, "r1").is_ok());
        assert!(fx.service.retrieve_preservation_file(&aip.id, "r1", &["d"], "f.pdf").is_ok());
        assert_eq!(fx.events.kinds(), vec!["preservation_metadata_created"; 4]);
    }

    #[test]
    fn create_twice_is_already_exists_update_overwrites() {
        let fx = fixture();
        let aip = fx.aip();
        let event = PreservationMetadata::event("ev1", &aip.id, None);
        fx.service.create_preservation_metadata(&event, &xml(), false).unwrap();
        assert!(fx
            .service
            .create_preservation_metadata(&event, &xml(), false)
            .unwrap_err()
            .is_already_exists());
        fx.service
            .update_preservation_metadata(&event, &"<v2/>".into(), true)
            .unwrap();
        let binary = fx.service.retrieve_preservation_event(&aip.id, None, "ev1").unwrap();
        assert_eq!(binary.content.read_all().unwrap().as_ref(), b"<v2/>");
    }

    #[test]
    fn scoped_metadata_needs_its_scope() {
        let fx = fixture();
        let aip = fx.aip();
        let orphan = PreservationMetadata::representation(&aip.id, "r9");
        assert!(fx
            .service
            .create_preservation_metadata(&orphan, &xml(), true)
            .unwrap_err()
            .is_not_found());
        assert!(fx
            .service
            .update_preservation_metadata(&PreservationMetadata::event("e", "ghost", None), &xml(), true)
            .unwrap_err()
            .is_not_found());
        assert!(fx.events.events().is_empty());
    }

    #[test]
    fn aggregate_listing_puts_aip_level_first() {
        let fx = fixture();
        let aip = fx.aip();
        for rep in ["r2", "r1"] {
            fx.service.create_representation(&aip.id, rep, false, false).unwrap();
            fx.service
                .create_preservation_metadata(&PreservationMetadata::representation(&aip.id, rep), &xml(), false)
                .unwrap();
            fx.service
                .create_preservation_metadata(&PreservationMetadata::event("e", &aip.id, Some(rep)), &xml(), false)
                .unwrap();
        }
        fx.service
            .create_preservation_metadata(&PreservationMetadata::event("ingest", &aip.id, None), &xml(), false)
            .unwrap();

        let all = fx
            .service
            .list_preservation_metadata(&aip.id, true)
            .unwrap()
            .try_collect()
            .unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].id, "ingest");
        let reps: Vec<_> = all[1..].iter().map(|pm| pm.representation_id.clone().unwrap()).collect();
        assert_eq!(reps, vec!["r2", "r2", "r1", "r1"]);

        let aip_only = fx.service.list_preservation_metadata(&aip.id, false).unwrap().count();
        assert_eq!(aip_only, 1);
        let r1 = fx
            .service
            .list_representation_preservation_metadata(&aip.id, "r1")
            .unwrap()
            .count();
        assert_eq!(r1, 2);
    }

    #[test]
    fn aggregate_listing_is_lazy() {
        let fx = fixture();
        let aip = fx.aip();
        fx.service.create_representation(&aip.id, "r1", false, false).unwrap();
        fx.service
            .create_preservation_metadata(&PreservationMetadata::event("ingest", &aip.id, None), &xml(), false)
            .unwrap();
        let mut listing = fx.service.list_preservation_metadata(&aip.id, true).unwrap();
        // The representation disappears after the listing was created but
        // before its part is reached: the failure surfaces in the stream.
        fx.storage
            .delete_resource(&representation_path(&aip.id, "r1").unwrap())
            .unwrap();
        assert!(listing.next().unwrap().is_ok());
        assert!(listing.next().unwrap().unwrap_err().is_not_found());
        assert!(listing.next().is_none());
    }

    #[test]
    fn empty_aip_lists_nothing_missing_aip_is_not_found() {
        let fx = fixture();
        let aip = fx.aip();
        assert_eq!(fx.service.list_preservation_metadata(&aip.id, true).unwrap().count(), 0);
        assert!(fx
            .service
            .list_preservation_metadata("ghost", true)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn agents_are_listed_globally() {
        let fx = fixture();
        for id in ["b", "a"] {
            fx.service
                .create_preservation_metadata(&PreservationMetadata::agent(id), &xml(), false)
                .unwrap();
        }
        let agents = fx.service.list_preservation_agents().unwrap().try_collect().unwrap();
        assert_eq!(agents.len(), 2);
        assert!(agents.iter().all(|a| a.metadata_type == PreservationMetadataType::Agent));
        fx.service
            .delete_preservation_metadata(&PreservationMetadata::agent("a"), true)
            .unwrap();
        assert_eq!(fx.service.list_preservation_agents().unwrap().count(), 1);
        assert_eq!(fx.events.kinds(), vec!["preservation_metadata_deleted"]);
    }
}
