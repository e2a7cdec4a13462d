//! Scripted fake portal for tests.
//!
//! Models the portal as a small state machine behind the `BrowserDriver`
//! trait: pages are classified by URL fragment, elements by the selectors the
//! real workflow uses. Waits evaluate their condition once; the scripted
//! portal is deterministic, so an unmet condition now is unmet forever.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::portal::driver::{BrowserDriver, DriverError, DriverFactory};
use crate::portal::selectors;

#[derive(Debug, Clone)]
pub struct MockBlock {
    pub name: String,
    pub expired: bool,
    /// Portal-assigned form-field suffix, unrelated to the block's position.
    pub suffix: u32,
}

#[derive(Debug, Clone)]
pub struct MockState {
    pub current_url: String,
    pub logged_in: bool,
    pub navigations: usize,
    pub reloads: usize,
    pub on_detail_page: bool,
    pub certificates_tab_open: bool,
    pub open_form: Option<usize>,
    pub fills: HashMap<String, String>,
    pub uploads: Vec<PathBuf>,
    pub submitted: bool,
    pub success_visible: bool,
    pub saved: bool,
    pub screenshots: usize,
    pub closed: bool,
    pub sessions_opened: usize,

    transient_login: bool,
    reject_login: bool,
    pending_recovery: bool,
    transient_visible: bool,
    hang_on_goto: bool,
    expired_plates: Vec<String>,
    expiring_plates: Vec<String>,
    blocks: Vec<MockBlock>,
}

impl MockState {
    fn view_plates(&self) -> Option<&Vec<String>> {
        if self.current_url.contains("situacoesDocumentos=2") {
            Some(&self.expired_plates)
        } else if self.current_url.contains("situacoesDocumentos=3") {
            Some(&self.expiring_plates)
        } else {
            None
        }
    }

    fn element_visible(&self, css: &str) -> bool {
        match css {
            s if s == selectors::LOGIN_USER_INPUT => {
                self.current_url.contains("usuario/exibir") && !self.transient_visible
            }
            s if s == selectors::VEHICLE_TABLE => {
                self.view_plates().is_some_and(|plates| !plates.is_empty())
            }
            s if s == selectors::CERTIFICATES_TAB => self.on_detail_page,
            s if s == selectors::CERTIFICATE_BLOCK => {
                self.certificates_tab_open && !self.blocks.is_empty()
            }
            s if s == selectors::SUCCESS_AREA => self.success_visible,
            _ => false,
        }
    }
}

pub struct MockPortalBuilder {
    state: MockState,
}

impl MockPortalBuilder {
    /// First dashboard redirect is replaced by the transient error page; a
    /// reload recovers the session.
    pub fn transient_login_error(mut self) -> Self {
        self.state.transient_login = true;
        self
    }

    /// Login silently goes nowhere: no redirect, no error banner.
    pub fn reject_login(mut self) -> Self {
        self.state.reject_login = true;
        self
    }

    /// Every navigation hangs until cancelled from outside.
    pub fn hang_on_navigation(mut self) -> Self {
        self.state.hang_on_goto = true;
        self
    }

    pub fn expired_view_plates(mut self, plates: &[&str]) -> Self {
        self.state.expired_plates = plates.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn expiring_view_plates(mut self, plates: &[&str]) -> Self {
        self.state.expiring_plates = plates.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn certificate(mut self, name: &str, expired: bool, suffix: u32) -> Self {
        self.state.blocks.push(MockBlock {
            name: name.to_string(),
            expired,
            suffix,
        });
        self
    }

    /// Starts the session already authenticated and on the vehicle detail
    /// page, for tests that exercise only the certificate steps.
    pub fn on_detail_page(mut self) -> Self {
        self.state.logged_in = true;
        self.state.on_detail_page = true;
        self.state.current_url = "https://portal.test/veiculo/editar/1".to_string();
        self
    }

    pub fn build(self) -> MockPortal {
        MockPortal {
            state: Arc::new(Mutex::new(self.state)),
        }
    }
}

pub struct MockPortal {
    state: Arc<Mutex<MockState>>,
}

impl MockPortal {
    pub fn builder() -> MockPortalBuilder {
        MockPortalBuilder {
            state: MockState {
                current_url: "about:blank".to_string(),
                logged_in: false,
                navigations: 0,
                reloads: 0,
                on_detail_page: false,
                certificates_tab_open: false,
                open_form: None,
                fills: HashMap::new(),
                uploads: Vec::new(),
                submitted: false,
                success_visible: false,
                saved: false,
                screenshots: 0,
                closed: false,
                sessions_opened: 0,
                transient_login: false,
                reject_login: false,
                pending_recovery: false,
                transient_visible: false,
                hang_on_goto: false,
                expired_plates: Vec::new(),
                expiring_plates: Vec::new(),
                blocks: Vec::new(),
            },
        }
    }

    pub fn driver(&self) -> MockDriver {
        MockDriver {
            state: Arc::clone(&self.state),
        }
    }

    pub fn factory(&self) -> MockDriverFactory {
        MockDriverFactory {
            state: Arc::clone(&self.state),
        }
    }

    pub fn state(&self) -> MockState {
        self.state.lock().unwrap().clone()
    }
}

pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn block(state: &MockState, index: usize) -> Result<&MockBlock, DriverError> {
        state.blocks.get(index).ok_or_else(|| {
            DriverError::NotFound(format!("certificate block index {}", index))
        })
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        let hang = self.lock().hang_on_goto;
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let mut state = self.lock();
        state.navigations += 1;
        state.current_url = url.to_string();
        state.on_detail_page = false;
        state.certificates_tab_open = false;
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.reloads += 1;
        if state.pending_recovery {
            state.pending_recovery = false;
            state.transient_visible = false;
            state.logged_in = true;
            state.current_url =
                "https://sites.redeipiranga.com.br/WAPortranNew/dashboard/index".to_string();
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.lock().current_url.clone())
    }

    async fn wait_visible(&mut self, css: &str, timeout: Duration) -> Result<(), DriverError> {
        if self.lock().element_visible(css) {
            Ok(())
        } else {
            Err(DriverError::WaitTimeout {
                what: css.to_string(),
                timeout,
            })
        }
    }

    async fn wait_visible_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let state = self.lock();
        if outer == selectors::CERTIFICATE_BLOCK
            && inner == selectors::NUMBER_INPUT
            && state.open_form == Some(index)
        {
            Ok(())
        } else {
            Err(DriverError::WaitTimeout {
                what: format!("{}[{}] {}", outer, index, inner),
                timeout,
            })
        }
    }

    async fn wait_url_contains(
        &mut self,
        fragment: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        if self.lock().current_url.contains(fragment) {
            Ok(())
        } else {
            Err(DriverError::WaitTimeout {
                what: format!("url containing {}", fragment),
                timeout,
            })
        }
    }

    async fn is_visible(&mut self, css: &str) -> Result<bool, DriverError> {
        Ok(self.lock().element_visible(css))
    }

    async fn visible_texts(&mut self, css: &str) -> Result<Vec<String>, DriverError> {
        let state = self.lock();
        if css == selectors::TRANSIENT_ERROR_CONTAINER && state.transient_visible {
            Ok(vec![selectors::TRANSIENT_ERROR_TEXT.to_string()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn count(&mut self, css: &str) -> Result<usize, DriverError> {
        let state = self.lock();
        match css {
            s if s == selectors::VEHICLE_ROWS => {
                Ok(state.view_plates().map_or(0, |plates| plates.len()))
            }
            s if s == selectors::CERTIFICATE_BLOCK => Ok(state.blocks.len()),
            _ => Ok(0),
        }
    }

    async fn count_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
    ) -> Result<usize, DriverError> {
        Ok(self.texts_within(outer, index, inner).await?.len())
    }

    async fn texts_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
    ) -> Result<Vec<String>, DriverError> {
        let state = self.lock();
        match (outer, inner) {
            (o, i) if o == selectors::VEHICLE_ROWS && i == selectors::VEHICLE_PLATE_CELL => {
                let plates = state
                    .view_plates()
                    .ok_or_else(|| DriverError::NotFound("vehicle table".to_string()))?;
                let plate = plates.get(index).ok_or_else(|| {
                    DriverError::NotFound(format!("vehicle row index {}", index))
                })?;
                Ok(vec![plate.clone()])
            }
            (o, i) if o == selectors::CERTIFICATE_BLOCK && i == selectors::CERTIFICATE_TITLE => {
                Ok(vec![Self::block(&state, index)?.name.clone()])
            }
            (o, i) if o == selectors::CERTIFICATE_BLOCK && i == selectors::EXPIRED_BADGE => {
                if Self::block(&state, index)?.expired {
                    Ok(vec![selectors::EXPIRED_BADGE_TEXT.to_string()])
                } else {
                    Ok(Vec::new())
                }
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn attr_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        attr: &str,
    ) -> Result<Option<String>, DriverError> {
        let state = self.lock();
        if outer == selectors::CERTIFICATE_BLOCK
            && inner == selectors::NUMBER_INPUT
            && attr == "id"
            && state.open_form == Some(index)
        {
            let block = Self::block(&state, index)?;
            Ok(Some(format!("licenca-numero-{}", block.suffix)))
        } else {
            Err(DriverError::NotFound(format!(
                "{} inside {}[{}]",
                inner, outer, index
            )))
        }
    }

    async fn fill(&mut self, css: &str, value: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.fills.insert(css.to_string(), value.to_string());
        Ok(())
    }

    async fn click(&mut self, css: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        match css {
            s if s == selectors::LOGIN_SUBMIT => {
                if state.reject_login {
                    // Nothing happens: no redirect, no banner.
                } else if state.transient_login && !state.pending_recovery && !state.logged_in {
                    state.transient_visible = true;
                    state.pending_recovery = true;
                } else {
                    state.logged_in = true;
                    state.current_url =
                        "https://sites.redeipiranga.com.br/WAPortranNew/dashboard/index"
                            .to_string();
                }
                Ok(())
            }
            s if s == selectors::CERTIFICATES_TAB => {
                if state.on_detail_page {
                    state.certificates_tab_open = true;
                    Ok(())
                } else {
                    Err(DriverError::NotFound(css.to_string()))
                }
            }
            s if s == selectors::SAVE_BUTTON => {
                state.saved = true;
                state.current_url = "https://portal.test/veiculo/index".to_string();
                Ok(())
            }
            _ => Err(DriverError::NotFound(css.to_string())),
        }
    }

    async fn click_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
    ) -> Result<(), DriverError> {
        let mut state = self.lock();
        match (outer, inner) {
            (o, i) if o == selectors::VEHICLE_ROWS && i == selectors::VEHICLE_EDIT_LINK => {
                let plates = state
                    .view_plates()
                    .ok_or_else(|| DriverError::NotFound("vehicle table".to_string()))?;
                if index >= plates.len() {
                    return Err(DriverError::NotFound(format!(
                        "vehicle row index {}",
                        index
                    )));
                }
                state.on_detail_page = true;
                state.current_url = "https://portal.test/veiculo/editar/1".to_string();
                Ok(())
            }
            (o, i) if o == selectors::CERTIFICATE_BLOCK && i == selectors::UPDATE_BUTTON => {
                Self::block(&state, index)?;
                state.open_form = Some(index);
                Ok(())
            }
            _ => Err(DriverError::NotFound(format!(
                "{} inside {}[{}]",
                inner, outer, index
            ))),
        }
    }

    async fn click_text_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        text: &str,
    ) -> Result<(), DriverError> {
        let mut state = self.lock();
        if outer == selectors::CERTIFICATE_BLOCK
            && inner == selectors::BLOCK_BUTTONS
            && text == selectors::SUBMIT_BUTTON_TEXT
            && state.open_form == Some(index)
        {
            state.submitted = true;
            state.success_visible = true;
            Ok(())
        } else {
            Err(DriverError::NotFound(format!(
                "{} with text {:?} inside {}[{}]",
                inner, text, outer, index
            )))
        }
    }

    async fn upload_within(
        &mut self,
        outer: &str,
        index: usize,
        inner: &str,
        file: &Path,
    ) -> Result<(), DriverError> {
        let mut state = self.lock();
        if outer == selectors::CERTIFICATE_BLOCK
            && inner == selectors::FILE_INPUT
            && state.open_form == Some(index)
        {
            state.uploads.push(file.to_path_buf());
            Ok(())
        } else {
            Err(DriverError::NotFound(format!(
                "{} inside {}[{}]",
                inner, outer, index
            )))
        }
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        let mut state = self.lock();
        state.screenshots += 1;
        Ok(b"\x89PNG mock".to_vec())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.lock().closed = true;
        Ok(())
    }
}

pub struct MockDriverFactory {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl DriverFactory for MockDriverFactory {
    async fn create(&self) -> Result<Box<dyn BrowserDriver>, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.sessions_opened += 1;
        Ok(Box::new(MockDriver {
            state: Arc::clone(&self.state),
        }))
    }
}
