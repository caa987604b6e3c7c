//! Contract jobs: compile, deploy and call.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::abi::Abi;
use crate::adapters::{CompileRequest, CompileResponse, CompiledObject, TxBody, TxRequest};
use crate::core::finalize::{extract, extract_hex, sign_and_broadcast};
use crate::core::interpolate::{resolve_in_place, resolve_libraries, resolve_str};
use crate::core::{finalize, normalize_address, Facet, JobError, RunContext};
use crate::domain::job::{Call, Compile, Deploy};
use crate::domain::{JobOutput, JobResults};

use super::{input_data, parse_nonce, parse_u64, require, resolve_source, use_default, JobHandler};

/// Deploy every contract in the file
const ALL_INSTANCES: &str = "all";

/// A contract path as given, or relative to the contracts directory
fn contract_path(ctx: &RunContext, file: &str) -> PathBuf {
    let given = PathBuf::from(file);
    if given.exists() || given.is_absolute() {
        given
    } else {
        ctx.paths.contracts.join(given)
    }
}

async fn compile(ctx: &RunContext, request: &CompileRequest) -> Result<CompileResponse, JobError> {
    debug!(files = ?request.files, "Compiling contracts");
    let response = ctx.compiler.compile(request).await?;

    if !response.error.is_empty() {
        return Err(JobError::Compile(response.error));
    }
    if !response.warning.is_empty() {
        warn!(warning = %response.warning, "Compiler warning");
    }
    if response.objects.is_empty() {
        return Err(JobError::Compile("the compiler returned no contracts".to_string()));
    }
    Ok(response)
}

fn decode_bytecode(name: &str, bytecode: &str) -> Result<Vec<u8>, JobError> {
    hex::decode(bytecode.trim().trim_start_matches("0x"))
        .map_err(|e| JobError::Compile(format!("invalid bytecode for {}: {}", name, e)))
}

// ============================================================================
// Compile
// ============================================================================

#[async_trait]
impl JobHandler for Compile {
    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        if self.files.is_empty() {
            return Err(JobError::Validation(
                "compile job requires at least one file".to_string(),
            ));
        }
        for file in self.files.iter_mut().chain(self.remappings.iter_mut()) {
            resolve_in_place(file, &ctx.results)?;
        }
        resolve_in_place(&mut self.version, &ctx.results)?;
        self.libraries = resolve_libraries(&self.libraries, &ctx.results)?;
        Ok(())
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let request = CompileRequest {
            files: self.files.iter().map(|f| contract_path(ctx, f)).collect(),
            version: Some(self.version.clone()).filter(|v| !v.is_empty()),
            libraries: self.libraries.clone(),
            remappings: self.remappings.clone(),
        };
        let response = compile(ctx, &request).await?;

        let mut names = Vec::with_capacity(response.objects.len());
        let mut bytecodes = std::collections::BTreeMap::new();
        for object in response.objects {
            if !object.abi.is_empty() {
                ctx.save_abi(&object.name, &object.abi)?;
            }
            bytecodes.insert(object.name.clone(), JobOutput::text(object.bytecode));
            names.push(object.name);
        }

        info!(contracts = %names.join(","), "Compiled contracts");
        Ok(JobResults::text(names.join(",")).with_named(bytecodes))
    }
}

// ============================================================================
// Deploy
// ============================================================================

impl Deploy {
    /// Deploy one compiled contract and return its address
    async fn deploy_object(
        &self,
        ctx: &mut RunContext,
        object: &CompiledObject,
    ) -> Result<String, JobError> {
        if !object.abi.is_empty() {
            ctx.save_abi(&object.name, &object.abi)?;
        }

        let mut code = decode_bytecode(&object.name, &object.bytecode)?;
        if self.save {
            std::fs::create_dir_all(&ctx.paths.bin)?;
            let path = ctx.paths.bin.join(format!("{}.bin", object.name));
            debug!(path = %path.display(), "Saving bytecode");
            std::fs::write(&path, &object.bytecode)?;
        }
        if !self.args.is_empty() {
            let abi = Abi::from_json(&object.abi)?;
            code.extend(abi.encode_constructor(&self.args)?);
        }

        let address = self.deploy_code(ctx, code).await?;
        if !object.abi.is_empty() {
            ctx.save_abi(&address, &object.abi)?;
        }
        info!(contract = %object.name, %address, "Contract deployed");
        Ok(address)
    }

    async fn deploy_code(&self, ctx: &RunContext, code: Vec<u8>) -> Result<String, JobError> {
        let request = TxRequest::new(
            normalize_address(&self.source),
            parse_nonce(&self.nonce)?,
            TxBody::Call {
                to: None,
                data: code,
                amount: parse_u64("amount", &self.amount)?,
                gas: parse_u64("gas", &self.gas)?,
                fee: parse_u64("fee", &self.fee)?,
            },
        );
        finalize(ctx, request, Facet::Address).await
    }

    /// Deploy a prebuilt `.bin` file as-is
    async fn deploy_binary(&self, ctx: &mut RunContext, path: &Path) -> Result<String, JobError> {
        let bytecode = tokio::fs::read_to_string(path).await?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut code = decode_bytecode(&name, &bytecode)?;

        if !self.args.is_empty() {
            let abi = ctx.load_abi(&name)?;
            code.extend(abi.encode_constructor(&self.args)?);
        }

        let address = self.deploy_code(ctx, code).await?;
        info!(binary = %path.display(), %address, "Binary deployed");
        Ok(address)
    }
}

#[async_trait]
impl JobHandler for Deploy {
    fn source(&self) -> Option<&str> {
        Some(&self.source)
    }

    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_source(&mut self.source, ctx)?;
        for field in [
            &mut self.contract,
            &mut self.instance,
            &mut self.amount,
            &mut self.fee,
            &mut self.gas,
            &mut self.nonce,
        ] {
            resolve_in_place(field, &ctx.results)?;
        }
        self.libraries = resolve_libraries(&self.libraries, &ctx.results)?;
        use_default(&mut self.amount, &ctx.defaults.amount);
        use_default(&mut self.fee, &ctx.defaults.fee);
        use_default(&mut self.gas, &ctx.defaults.gas);
        require("deploy", "contract", &self.contract)?;

        let (_, args) = input_data("", self.data.as_ref(), ctx, true)?;
        self.args = args;
        Ok(())
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let path = contract_path(ctx, &self.contract);
        if path.extension().is_some_and(|ext| ext == "bin") {
            let address = self.deploy_binary(ctx, &path).await?;
            return Ok(JobResults::text(address));
        }

        let request = CompileRequest {
            files: vec![path.clone()],
            version: None,
            libraries: self.libraries.clone(),
            remappings: Vec::new(),
        };
        let objects: Vec<CompiledObject> = compile(ctx, &request)
            .await?
            .objects
            .into_iter()
            .filter(|o| {
                let deployable = !o.bytecode.trim().is_empty();
                if !deployable {
                    debug!(contract = %o.name, "Skipping contract without bytecode");
                }
                deployable
            })
            .collect();

        let base_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let address = match (self.instance.as_str(), objects.as_slice()) {
            (_, []) => {
                return Err(JobError::Compile(format!(
                    "{} contains no deployable contracts",
                    path.display()
                )))
            }
            (_, [only]) => self.deploy_object(ctx, only).await?,
            (ALL_INSTANCES, many) => {
                let mut matched = None;
                let mut last = String::new();
                for object in many {
                    last = self.deploy_object(ctx, object).await?;
                    if object.name.eq_ignore_ascii_case(&base_name) {
                        matched = Some(last.clone());
                    }
                }
                matched.unwrap_or_else(|| {
                    warn!(
                        file = %base_name,
                        "No deployed contract matches the file name; recording the last deployed address"
                    );
                    last
                })
            }
            (instance, many) => {
                let wanted = if instance.is_empty() {
                    base_name.as_str()
                } else {
                    instance
                };
                let object = many
                    .iter()
                    .find(|o| o.name.eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        JobError::Validation(format!(
                            "contract {} was not found in {}",
                            wanted,
                            path.display()
                        ))
                    })?;
                self.deploy_object(ctx, object).await?
            }
        };

        Ok(JobResults::text(address))
    }
}

// ============================================================================
// Call
// ============================================================================

/// Call data for `function(args)` against the ABI at `location`.
///
/// A fallback call (empty function) that cannot be encoded against its ABI
/// goes out with empty call data instead of failing.
pub(crate) fn call_data(
    ctx: &RunContext,
    location: &str,
    function: &str,
    args: &[String],
) -> Result<(Option<Abi>, Vec<u8>), JobError> {
    let abi = match ctx.load_abi(location) {
        Ok(abi) => abi,
        Err(e) if function.is_empty() => {
            warn!(error = %e, "No ABI for fallback call, sending empty call data");
            return Ok((None, Vec::new()));
        }
        Err(e) => return Err(e),
    };

    match abi.encode_call(function, args) {
        Ok(data) => Ok((Some(abi), data)),
        Err(e) if function.is_empty() => {
            warn!(error = %e, "Fallback call could not be encoded, sending empty call data");
            Ok((Some(abi), Vec::new()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Results for data returned by `function`
pub(crate) fn decode_output(
    abi: Option<&Abi>,
    function: &str,
    data: &[u8],
) -> Result<JobResults, JobError> {
    if data.is_empty() {
        debug!("No return from contract");
        return Ok(JobResults::empty());
    }
    match abi {
        Some(abi) if !function.is_empty() => Ok(abi.decode_return(function, data)?),
        _ => Ok(JobResults::text(hex::encode_upper(data))),
    }
}

#[async_trait]
impl JobHandler for Call {
    fn source(&self) -> Option<&str> {
        Some(&self.source)
    }

    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_source(&mut self.source, ctx)?;
        for field in [
            &mut self.destination,
            &mut self.amount,
            &mut self.fee,
            &mut self.gas,
            &mut self.nonce,
            &mut self.abi,
            &mut self.save,
        ] {
            resolve_in_place(field, &ctx.results)?;
        }
        self.function = resolve_str(&self.function, &ctx.results)?;
        use_default(&mut self.amount, &ctx.defaults.amount);
        use_default(&mut self.fee, &ctx.defaults.fee);
        use_default(&mut self.gas, &ctx.defaults.gas);
        require("call", "destination", &self.destination)?;
        self.destination = normalize_address(&self.destination);

        let (function, args) = input_data(&self.function, self.data.as_ref(), ctx, false)?;
        self.function = function;
        self.args = args;
        Ok(())
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let location = if self.abi.is_empty() {
            &self.destination
        } else {
            &self.abi
        };
        let (abi, data) = call_data(ctx, location, &self.function, &self.args)?;

        let request = TxRequest::new(
            normalize_address(&self.source),
            parse_nonce(&self.nonce)?,
            TxBody::Call {
                to: Some(self.destination.clone()),
                data,
                amount: parse_u64("amount", &self.amount)?,
                gas: parse_u64("gas", &self.gas)?,
                fee: parse_u64("fee", &self.fee)?,
            },
        );
        let receipt = sign_and_broadcast(ctx, request).await?;

        if self.save == "tx" {
            return Ok(JobResults::text(extract_hex(&receipt, Facet::Hash)?));
        }

        match extract(&receipt, Facet::Return) {
            Ok(data) => decode_output(abi.as_ref(), &self.function, data),
            Err(JobError::NoResult(_)) => {
                debug!(function = %self.function, "No return from contract");
                Ok(JobResults::empty())
            }
            Err(e) => Err(e),
        }
    }
}
