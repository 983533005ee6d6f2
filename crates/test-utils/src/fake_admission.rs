use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use taskloop::admission::{Admission, AdmissionControl, UsageProvider, Utilization};
use taskloop::errors::{Result, TaskloopError};

/// Admission control answering from a script, then `Ok` forever.
#[derive(Clone, Default)]
pub struct ScriptedAdmission {
    answers: Arc<Mutex<VecDeque<Admission>>>,
    calls: Arc<Mutex<u32>>,
}

impl ScriptedAdmission {
    pub fn new(answers: &[Admission]) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.iter().copied().collect())),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl AdmissionControl for ScriptedAdmission {
    fn check(&mut self) -> Pin<Box<dyn Future<Output = Admission> + Send + '_>> {
        *self.calls.lock().unwrap() += 1;
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Admission::Ok);
        Box::pin(async move { answer })
    }
}

/// Usage provider returning scripted readings or errors; the last response
/// repeats once the script runs out.
#[derive(Clone)]
pub struct FakeUsageProvider {
    responses: Arc<Mutex<VecDeque<std::result::Result<Utilization, String>>>>,
    last: Arc<Mutex<std::result::Result<Utilization, String>>>,
    calls: Arc<Mutex<u32>>,
}

impl FakeUsageProvider {
    pub fn new(responses: Vec<std::result::Result<Utilization, String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            last: Arc::new(Mutex::new(Ok(Utilization::default()))),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn reading(five_hour: f64, seven_day: f64) -> Self {
        Self::new(vec![Ok(Utilization {
            five_hour,
            seven_day,
        })])
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl UsageProvider for FakeUsageProvider {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Utilization>> + Send + '_>> {
        *self.calls.lock().unwrap() += 1;

        let response = {
            let mut responses = self.responses.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = responses.pop_front() {
                *last = next;
            }
            last.clone()
        };

        Box::pin(async move { response.map_err(|e| TaskloopError::Other(anyhow::anyhow!(e))) })
    }
}

/// Usage provider whose fetch never resolves, like a credential helper
/// waiting on a keychain prompt.
#[derive(Clone, Default)]
pub struct HangingUsageProvider {
    calls: Arc<Mutex<u32>>,
}

impl HangingUsageProvider {
    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl UsageProvider for HangingUsageProvider {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Utilization>> + Send + '_>> {
        *self.calls.lock().unwrap() += 1;
        Box::pin(std::future::pending())
    }
}
