//! Per-account module registry
//!
//! State machine per (account, type, module): `Uninstalled -> Installed ->
//! Uninstalled`. Records are keyed by module address so one module can never
//! sit under two types at once.

use std::collections::BTreeMap;

use autoyield_types::{Address, AutoYieldError, Call, Event, ModuleType, Result, Selector};
use serde::{Deserialize, Serialize};

use crate::{ModuleKind, ModuleState};

/// An installed module record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledModule {
    pub module_type: ModuleType,
    pub kind: ModuleKind,
    pub state: ModuleState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleRegistry {
    installed: BTreeMap<Address, InstalledModule>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `module` (an implementation of `kind`) as `module_type`.
    ///
    /// The record is created only after `on_install` succeeds.
    pub fn install(
        &mut self,
        account: &Address,
        module_type: ModuleType,
        module: &Address,
        kind: ModuleKind,
        init_data: &[u8],
        events: &mut Vec<Event>,
    ) -> Result<()> {
        if !kind.supports(module_type) {
            return Err(AutoYieldError::ModuleTypeNotSupported {
                module: *module,
                module_type,
            });
        }
        if let Some(existing) = self.installed.get(module) {
            return Err(AutoYieldError::ModuleAlreadyInstalled {
                module: *module,
                module_type: existing.module_type,
            });
        }

        let state = kind.on_install(module, init_data)?;
        self.installed.insert(
            *module,
            InstalledModule {
                module_type,
                kind,
                state,
            },
        );

        tracing::info!(account = %account, module = %module, module_type = %module_type, kind = kind.name(), "module installed");
        events.push(Event::ModuleInstalled {
            account: *account,
            module_type,
            module: *module,
        });
        Ok(())
    }

    /// Uninstall `module` from `module_type`; `on_uninstall` runs first and
    /// the record is removed only if it succeeds.
    pub fn uninstall(
        &mut self,
        account: &Address,
        module_type: ModuleType,
        module: &Address,
        deinit_data: &[u8],
        events: &mut Vec<Event>,
    ) -> Result<()> {
        let record = match self.installed.get(module) {
            Some(record) if record.module_type == module_type => record,
            _ => {
                return Err(AutoYieldError::ModuleNotInstalled {
                    module: *module,
                    module_type,
                })
            }
        };

        record.kind.on_uninstall(module, &record.state, deinit_data)?;
        self.installed.remove(module);

        tracing::info!(account = %account, module = %module, module_type = %module_type, "module uninstalled");
        events.push(Event::ModuleUninstalled {
            account: *account,
            module_type,
            module: *module,
        });
        Ok(())
    }

    /// `context` narrows the query for fallbacks: when it carries a 4-byte
    /// selector, the fallback must also answer that selector.
    pub fn is_module_installed(&self, module_type: ModuleType, module: &Address, context: &[u8]) -> bool {
        match self.installed.get(module) {
            Some(record) if record.module_type == module_type => {
                if module_type == ModuleType::Fallback && context.len() >= 4 {
                    let mut selector = [0u8; 4];
                    selector.copy_from_slice(&context[..4]);
                    record.state.handles(&selector)
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn get(&self, module: &Address) -> Option<&InstalledModule> {
        self.installed.get(module)
    }

    /// Installed modules of one type
    pub fn of_type(&self, module_type: ModuleType) -> impl Iterator<Item = (&Address, &InstalledModule)> {
        self.installed
            .iter()
            .filter(move |(_, record)| record.module_type == module_type)
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }

    /// Check `signature` with an installed validator
    pub fn validate_with(&self, validator: &Address, hash: &[u8; 32], signature: &[u8]) -> Result<()> {
        match self.installed.get(validator) {
            Some(record) if record.module_type == ModuleType::Validator => {
                record.state.validate_signature(hash, signature)
            }
            _ => Err(AutoYieldError::ValidatorNotInstalled {
                validator: *validator,
            }),
        }
    }

    /// An installed executor may rebalance `token` on the account's behalf
    pub fn authorize_executor(&self, executor: &Address, token: &Address) -> Result<()> {
        match self.installed.get(executor) {
            Some(record) if record.module_type == ModuleType::Executor => {
                if record.state.permits_rebalance(token) {
                    Ok(())
                } else {
                    Err(AutoYieldError::Unauthorized {
                        reason: format!("executor {} is not scoped to token {}", executor, token),
                    })
                }
            }
            _ => Err(AutoYieldError::ModuleNotInstalled {
                module: *executor,
                module_type: ModuleType::Executor,
            }),
        }
    }

    /// Run every installed hook's pre-check
    pub fn pre_execute(&self, call: &Call) -> Result<()> {
        for (hook, record) in self.of_type(ModuleType::Hook) {
            record
                .state
                .pre_check(call)
                .map_err(|reason| AutoYieldError::HookRejected {
                    hook: *hook,
                    reason,
                })?;
        }
        Ok(())
    }

    /// Run every installed hook's post-check
    pub fn post_execute(&mut self, call: &Call) {
        for record in self.installed.values_mut() {
            if record.module_type == ModuleType::Hook {
                record.state.post_check(call);
            }
        }
    }

    /// Answer a call the account does not handle itself
    pub fn handle_fallback(&self, account: &Address, selector: &Selector) -> Result<Vec<u8>> {
        self.of_type(ModuleType::Fallback)
            .find(|(_, record)| record.state.handles(selector))
            .map(|_| selector.to_vec())
            .ok_or_else(|| AutoYieldError::CallFailed {
                to: *account,
                reason: format!("no fallback handles selector 0x{}", hex::encode(selector)),
            })
    }
}
