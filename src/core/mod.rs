use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub mod triggers;
pub mod workflow;

pub use triggers::{RequestGate, RequestKind, RequestPermit};
pub use workflow::{FieldForm, FieldParent, PickedElement, SelectionForm, WorkflowMode};

use crate::config::AppConfig;
use crate::dsl::{BaseParameters, ConfigAssembler};
use crate::error::{StudioError, StudioResult};
use crate::inspector::{Inspector, PreviewDocument};
use crate::logging::{LogContext, RequestIdGenerator};
use crate::messenger::{self, ControllerInbox, PreviewMessage, SelectedElementEvent};
use crate::service::{ConfigService, PreparePageRequest, SavedConfig, ScraperRun};
use crate::store::{Field, Selection, SelectionListView, SelectionStore};
use crate::validation::{ValidationClient, ValidationReport};
use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

/// User-visible status message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBanner {
    pub level: StatusLevel,
    pub message: String,
    /// Percent complete while a request is in flight
    pub progress: Option<u8>,
}

/// Controller of the selection workflow
pub struct SelectorStudio {
    config: AppConfig,
    controller_origin: Url,
    service: Arc<dyn ConfigService>,
    validation: ValidationClient,
    store: SelectionStore,
    list_view: SelectionListView,
    mode: WorkflowMode,
    selection_form: Option<SelectionForm>,
    field_form: Option<FieldForm>,
    inspector: Option<Inspector>,
    inbox: Option<ControllerInbox>,
    gate: RequestGate,
    status: Option<StatusBanner>,
    target_url: Option<String>,
    base: Option<BaseParameters>,
    generated_yaml: Option<String>,
    validation_view: Option<ValidationReport>,
}

impl SelectorStudio {
    pub fn new(config: AppConfig, service: Arc<dyn ConfigService>) -> StudioResult<Self> {
        let controller_origin = Url::parse(&config.preview.controller_origin)
            .map_err(|e| StudioError::config(format!("invalid controller origin: {}", e)))?;

        info!("Selector studio initialized (controller origin {})", controller_origin);

        Ok(Self {
            config,
            controller_origin,
            validation: ValidationClient::new(Arc::clone(&service)),
            service,
            store: SelectionStore::new(),
            list_view: SelectionListView::default(),
            mode: WorkflowMode::Idle,
            selection_form: None,
            field_form: None,
            inspector: None,
            inbox: None,
            gate: RequestGate::new(),
            status: None,
            target_url: None,
            base: None,
            generated_yaml: None,
            validation_view: None,
        })
    }

    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    pub fn list_view(&self) -> &SelectionListView {
        &self.list_view
    }

    pub fn mode(&self) -> &WorkflowMode {
        &self.mode
    }

    pub fn status(&self) -> Option<&StatusBanner> {
        self.status.as_ref()
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn target_url(&self) -> Option<&str> {
        self.target_url.as_deref()
    }

    pub fn base_parameters(&self) -> Option<&BaseParameters> {
        self.base.as_ref()
    }

    pub fn generated_yaml(&self) -> Option<&str> {
        self.generated_yaml.as_deref()
    }

    pub fn validation_view(&self) -> Option<&ValidationReport> {
        self.validation_view.as_ref()
    }

    pub fn inspector(&self) -> Option<&Inspector> {
        self.inspector.as_ref()
    }

    pub fn inspector_mut(&mut self) -> Option<&mut Inspector> {
        self.inspector.as_mut()
    }

    pub fn selection_form(&self) -> Option<&SelectionForm> {
        self.selection_form.as_ref()
    }

    pub fn selection_form_mut(&mut self) -> Option<&mut SelectionForm> {
        self.selection_form.as_mut()
    }

    pub fn field_form(&self) -> Option<&FieldForm> {
        self.field_form.as_ref()
    }

    pub fn field_form_mut(&mut self) -> Option<&mut FieldForm> {
        self.field_form.as_mut()
    }

    /// Whether the generate-config trigger is enabled
    pub fn can_generate(&self) -> bool {
        !self.store.is_empty()
            && self.target_url.is_some()
            && self.gate.is_enabled(RequestKind::GenerateConfig)
    }

    fn set_status(&mut self, level: StatusLevel, message: impl Into<String>, progress: Option<u8>) {
        self.status = Some(StatusBanner {
            level,
            message: message.into(),
            progress,
        });
    }

    /// Surface an error as a banner and hand it back to the caller
    fn fail(&mut self, context: LogContext, error: StudioError) -> StudioError {
        let context = context.with_error_category(error.category());
        log_error!(context, error, "Request failed");
        self.set_status(StatusLevel::Error, error.to_string(), None);
        error
    }

    fn refresh_list(&mut self) {
        self.list_view = SelectionListView::render(&self.store);
    }

    /// Ask the backend to prepare `url`; returns the proxied preview address
    pub async fn prepare_page(&mut self, url: &str) -> StudioResult<Url> {
        let context = LogContext::new("controller", "prepare_page")
            .with_request_id(RequestIdGenerator::generate())
            .with_url(url);

        let target = match Url::parse(url) {
            Ok(target) => target,
            Err(e) => {
                let err = StudioError::preparation(format!("invalid URL '{}': {}", url, e));
                return Err(self.fail(context, err));
            }
        };

        let _permit = match self.gate.acquire(RequestKind::PreparePage) {
            Ok(permit) => permit,
            Err(e) => return Err(self.fail(context, e)),
        };
        self.set_status(StatusLevel::Info, "Preparing page...", Some(10));
        log_info!(context, "Preparing page");

        let request = PreparePageRequest {
            url: target.to_string(),
            llm_provider: Some(self.config.llm.provider.clone()),
            llm_model: Some(self.config.llm.model.clone()),
            llm_api_key: self.config.llm.api_key.clone(),
        };

        let service = Arc::clone(&self.service);
        let preview = match service.prepare_page(&request).await {
            Ok(()) => service.preview_url(&target),
            Err(e) => Err(e),
        };

        match preview {
            Ok(preview) => {
                self.target_url = Some(target.to_string());
                self.base = Some(BaseParameters::with_defaults(target.as_str(), &self.config.output));
                self.generated_yaml = None;
                self.validation_view = None;
                self.set_status(
                    StatusLevel::Success,
                    "Page prepared successfully! Loading preview...",
                    Some(50),
                );
                Ok(preview)
            }
            Err(e) => Err(self.fail(context, e)),
        }
    }

    /// Load the rendered preview and wire up its inspector
    pub fn attach_preview(&mut self, html: &str, preview_url: Url) {
        if let Some(inspector) = self.inspector.as_mut() {
            inspector.disable();
        }

        let document = PreviewDocument::load(html, preview_url, &self.controller_origin);
        let (port, inbox) = messenger::channel(document.origin());

        if let Some(base) = self.base.as_mut() {
            base.render_js = BaseParameters::infer_render_js(html);
        }

        info!("Preview attached from {}", document.url());
        self.inspector = Some(Inspector::new(document, port));
        self.inbox = Some(inbox);
        self.set_status(StatusLevel::Success, "Preview loaded", Some(100));
    }

    /// Enable the inspector for the workflow already recorded in `mode`
    fn enable_inspector(&mut self, scope: Option<String>) -> StudioResult<()> {
        let result = match self.inspector.as_mut() {
            Some(inspector) => {
                inspector.set_scope(scope);
                inspector.enable()
            }
            None => Err(StudioError::preview_access("no preview is loaded")),
        };

        if let Err(e) = &result {
            warn!("Inspector unavailable, falling back to manual entry: {}", e);
            self.set_status(
                StatusLevel::Error,
                format!("{}. Enter the selector manually.", e),
                None,
            );
        }
        result
    }

    fn disable_inspector(&mut self) {
        if let Some(inspector) = self.inspector.as_mut() {
            inspector.set_scope(None);
            inspector.disable();
        }
    }

    /// Open the add-selection form and start picking.
    ///
    /// On preview access failure the form stays open for manual entry.
    pub fn begin_selection(&mut self) -> StudioResult<()> {
        self.mode = WorkflowMode::BuildingTopLevelSelection;
        self.selection_form = Some(SelectionForm::new());
        self.field_form = None;
        self.enable_inspector(None)
    }

    /// Start picking a field for the group in the open selection form
    pub fn begin_group_field(&mut self) -> StudioResult<()> {
        let scope = match self.selection_form.as_ref() {
            Some(form) if form.is_group => form.selector.trim().to_string(),
            Some(_) => return Err(StudioError::invalid_state("the selection is not a group")),
            None => return Err(StudioError::invalid_state("no selection form is open")),
        };
        if scope.is_empty() {
            return Err(self.reject(StudioError::incomplete_form("container selector")));
        }

        self.mode = WorkflowMode::BuildingGroupField(FieldParent::Draft);
        self.field_form = Some(FieldForm::new());
        self.enable_inspector(Some(scope))
    }

    /// Start picking a new field for a group that is already saved
    pub fn begin_field_for(&mut self, group: &str) -> StudioResult<()> {
        let scope = match self.store.get(group) {
            Some(selection) if selection.is_group() => selection.selector.clone(),
            Some(_) => return Err(StudioError::invalid_state(format!("'{}' is not a group", group))),
            None => return Err(StudioError::not_found(group)),
        };

        self.mode = WorkflowMode::BuildingGroupField(FieldParent::Saved(group.to_string()));
        self.selection_form = None;
        self.field_form = Some(FieldForm::new());
        self.enable_inspector(Some(scope))
    }

    /// Drain the preview channel; returns how many events were routed to a form
    pub fn pump_messages(&mut self) -> usize {
        let mut events = Vec::new();
        if let Some(inbox) = self.inbox.as_mut() {
            while let Some(message) = inbox.try_next() {
                match message {
                    Ok(PreviewMessage::ElementSelected(event)) => events.push(event),
                    Err(e) => {
                        let context = LogContext::new("controller", "pump_messages")
                            .with_error_category(e.category())
                            .with_string_field("reason", e.to_string());
                        log_warn!(context, "Skipping preview message");
                    }
                }
            }
        }

        events.into_iter().filter(|event| self.dispatch(event)).count()
    }

    /// Route a picked element to the pending form
    pub fn dispatch(&mut self, event: &SelectedElementEvent) -> bool {
        // Field picks must resolve inside the group container
        if matches!(self.mode, WorkflowMode::BuildingGroupField(_)) && event.scope.is_none() {
            let error = StudioError::invalid_state(format!(
                "'{}' is outside the group container; pick an element inside it",
                event.selector
            ));
            self.reject(error);
            return false;
        }

        match &self.mode {
            WorkflowMode::Idle => {
                debug!("No workflow pending; discarding pick of {}", event.selector);
                false
            }
            WorkflowMode::BuildingTopLevelSelection => {
                self.selection_form
                    .get_or_insert_with(SelectionForm::new)
                    .apply_event(event);
                true
            }
            WorkflowMode::BuildingGroupField(_) => {
                self.field_form.get_or_insert_with(FieldForm::new).apply_event(event);
                true
            }
        }
    }

    /// Save the open field form into its parent group
    pub fn save_field(&mut self) -> StudioResult<()> {
        let WorkflowMode::BuildingGroupField(parent) = self.mode.clone() else {
            return Err(StudioError::invalid_state("no field is being built"));
        };
        let form = self
            .field_form
            .as_ref()
            .ok_or_else(|| StudioError::invalid_state("no field form is open"))?;

        let (name, field) = match form.to_field() {
            Ok(parts) => parts,
            Err(e) => return Err(self.reject(e)),
        };

        let result = match &parent {
            FieldParent::Draft => match self.selection_form.as_mut() {
                Some(draft) => draft.add_field(&name, field),
                None => Err(StudioError::invalid_state("no selection form is open")),
            },
            FieldParent::Saved(group) => self.store.add_field(group, name.clone(), field),
        };
        if let Err(e) = result {
            return Err(self.reject(e));
        }

        self.field_form = None;
        match parent {
            FieldParent::Draft => {
                self.mode = WorkflowMode::BuildingTopLevelSelection;
                if let Some(inspector) = self.inspector.as_mut() {
                    inspector.set_scope(None);
                }
            }
            FieldParent::Saved(group) => {
                self.refresh_list();
                self.mode = WorkflowMode::Idle;
                self.disable_inspector();
                info!("Field '{}' added to '{}'", name, group);
            }
        }
        Ok(())
    }

    /// Validate the selection form and write it into the store
    pub fn save_selection(&mut self) -> StudioResult<String> {
        let form = self
            .selection_form
            .as_ref()
            .ok_or_else(|| StudioError::invalid_state("no selection form is open"))?;

        let (name, selection) = match form.to_selection() {
            Ok(parts) => parts,
            Err(e) => return Err(self.reject(e)),
        };

        if let Err(e) = self.store.add(name.clone(), selection) {
            return Err(self.reject(e));
        }
        self.refresh_list();

        self.selection_form = None;
        self.field_form = None;
        self.mode = WorkflowMode::Idle;
        self.disable_inspector();

        let context = LogContext::new("controller", "save_selection").with_selection(name.clone());
        log_info!(context, "Selection saved");
        self.set_status(StatusLevel::Success, format!("Selection '{}' saved", name), None);
        Ok(name)
    }

    /// Local form errors: banner only, nothing is mutated
    fn reject(&mut self, error: StudioError) -> StudioError {
        let context = LogContext::new("controller", "form")
            .with_status("rejected")
            .with_error_category(error.category())
            .with_string_field("reason", error.to_string());
        log_warn!(context, "Form rejected");
        self.set_status(StatusLevel::Error, error.to_string(), None);
        error
    }

    /// Close any pending form and stop picking
    pub fn cancel(&mut self) {
        self.selection_form = None;
        self.field_form = None;
        self.mode = WorkflowMode::Idle;
        self.disable_inspector();
    }

    pub fn remove_selection(&mut self, name: &str) -> Option<Selection> {
        let removed = self.store.remove(name);
        self.refresh_list();
        if self.store.is_empty() {
            self.generated_yaml = None;
        }
        removed
    }

    pub fn remove_field(&mut self, group: &str, name: &str) -> Option<Field> {
        let removed = self.store.remove_field(group, name);
        self.refresh_list();
        removed
    }

    fn require_target(&self) -> StudioResult<String> {
        self.target_url
            .clone()
            .ok_or_else(|| StudioError::invalid_state("no page has been prepared"))
    }

    /// Generate the configuration document from the saved selections
    pub async fn generate_config(&mut self) -> StudioResult<String> {
        let context = LogContext::new("controller", "generate_config")
            .with_request_id(RequestIdGenerator::generate());

        if self.store.is_empty() {
            let err = StudioError::generation("add at least one selection first");
            return Err(self.fail(context, err));
        }
        let url = match self.require_target() {
            Ok(url) => url,
            Err(e) => return Err(self.fail(context, e)),
        };
        let context = context.with_url(url.clone());

        let _permit = match self.gate.acquire(RequestKind::GenerateConfig) {
            Ok(permit) => permit,
            Err(e) => return Err(self.fail(context, e)),
        };
        self.set_status(StatusLevel::Info, "Generating configuration...", Some(25));

        let service = Arc::clone(&self.service);
        let result = service.generate_config(&url, self.store.all()).await;
        let generated = match result {
            Ok(generated) => generated,
            Err(e) => return Err(self.fail(context, e)),
        };

        // Base parameters come from the backend; `extract` is always re-derived locally
        let base = match BaseParameters::from_yaml(&generated.yaml_config) {
            Ok(base) => base,
            Err(e) => return Err(self.fail(context, StudioError::generation(e.to_string()))),
        };
        let yaml = match ConfigAssembler::assemble(&self.store, base.clone()).to_yaml() {
            Ok(yaml) => yaml,
            Err(e) => return Err(self.fail(context, e)),
        };

        if generated.validation_results.as_object().is_some_and(|o| !o.is_empty()) {
            match ValidationReport::from_response(&generated.validation_results, self.store.all()) {
                Ok(report) => self.validation_view = Some(report),
                Err(e) => warn!("Ignoring validation results from generation: {}", e),
            }
        }

        self.base = Some(base);
        self.generated_yaml = Some(yaml.clone());
        let context = context.with_number_field("selections", self.store.len() as i64);
        log_info!(context, "Configuration generated");
        self.set_status(StatusLevel::Success, "Configuration generated successfully", Some(100));
        Ok(yaml)
    }

    /// Validate the saved selections against the prepared page
    pub async fn validate_selectors(&mut self) -> StudioResult<ValidationReport> {
        let context = LogContext::new("controller", "validate_selectors")
            .with_request_id(RequestIdGenerator::generate());

        let url = match self.require_target() {
            Ok(url) => url,
            Err(e) => return Err(self.fail(context, e)),
        };
        let context = context.with_url(url.clone());

        let _permit = match self.gate.acquire(RequestKind::ValidateSelectors) {
            Ok(permit) => permit,
            Err(e) => return Err(self.fail(context, e)),
        };
        self.set_status(StatusLevel::Info, "Testing selectors...", Some(50));

        let base = self
            .base
            .clone()
            .unwrap_or_else(|| BaseParameters::with_defaults(url.as_str(), &self.config.output));

        let result = self.validation.validate(&url, &self.store, base).await;
        match result {
            Ok(report) => {
                let (level, message) = if report.all_passed() {
                    (StatusLevel::Success, "Selectors tested successfully!")
                } else {
                    (StatusLevel::Info, "Selectors tested; some did not match")
                };
                self.set_status(level, message, Some(100));
                self.validation_view = Some(report.clone());
                Ok(report)
            }
            Err(e) => Err(self.fail(context, e)),
        }
    }

    fn require_generated(&self) -> StudioResult<String> {
        self.generated_yaml
            .clone()
            .ok_or_else(|| StudioError::invalid_state("generate a configuration first"))
    }

    /// Hand the generated configuration to the packaging service
    pub async fn save_config(&mut self) -> StudioResult<SavedConfig> {
        let context = LogContext::new("controller", "save_config")
            .with_request_id(RequestIdGenerator::generate());

        let yaml = match self.require_generated() {
            Ok(yaml) => yaml,
            Err(e) => return Err(self.fail(context, e)),
        };
        let _permit = match self.gate.acquire(RequestKind::SaveConfig) {
            Ok(permit) => permit,
            Err(e) => return Err(self.fail(context, e)),
        };
        self.set_status(StatusLevel::Info, "Saving configuration...", Some(50));

        let service = Arc::clone(&self.service);
        match service.save_config(&yaml).await {
            Ok(saved) => {
                let context = context.with_string_field("filename", saved.filename.clone());
                log_info!(context, "Configuration saved");
                self.set_status(
                    StatusLevel::Success,
                    format!("Configuration saved as {}", saved.filename),
                    Some(100),
                );
                Ok(saved)
            }
            Err(e) => Err(self.fail(context, e)),
        }
    }

    /// Run the scraping engine with the generated configuration
    pub async fn run_scraper(&mut self) -> StudioResult<ScraperRun> {
        let context = LogContext::new("controller", "run_scraper")
            .with_request_id(RequestIdGenerator::generate());

        let yaml = match self.require_generated() {
            Ok(yaml) => yaml,
            Err(e) => return Err(self.fail(context, e)),
        };
        let _permit = match self.gate.acquire(RequestKind::RunScraper) {
            Ok(permit) => permit,
            Err(e) => return Err(self.fail(context, e)),
        };
        self.set_status(StatusLevel::Info, "Running scraper...", Some(10));

        let service = Arc::clone(&self.service);
        match service.run_scraper(&yaml).await {
            Ok(run) => {
                self.set_status(
                    StatusLevel::Success,
                    format!("Scraper completed! Output saved to: {}", run.output_path),
                    Some(100),
                );
                Ok(run)
            }
            Err(e) => Err(self.fail(context, e)),
        }
    }
}
